//! Built-in default flow
//!
//! Used when no flow file is found anywhere in the resolution cascade:
//! plan → critique → consolidate → implement → review, alternating between
//! providers so each stage is checked by a different model.

use council_domain::FlowStep;

pub fn default_flow_steps() -> Vec<FlowStep> {
    let plan_instruction = "You are a pragmatic senior software architect. Analyze the \
        requirement below and produce a structured implementation plan with: \
        1. OVERVIEW - what will be built and why. \
        2. ARCHITECTURE - components, dependencies and integrations. \
        3. IMPLEMENTATION STEPS - an ordered task list naming the files to create or change. \
        4. RISKS - potential problems and their mitigations. \
        5. SUCCESS CRITERIA - how to validate the result. \
        Be specific about file, function and data structure names; avoid generalities.";

    let critique_instruction = "You are a rigorous, skeptical technical auditor. Your job is \
        to find the flaws the architect missed. Review the plan for: \
        architectural faults (coupling, scalability), security issues (injection, data \
        exposure, supply chain), uncovered edge cases and race conditions, unnecessary \
        complexity, and risky dependencies. Classify every finding as CRITICAL, HIGH, \
        MEDIUM or LOW and propose a concrete fix. Do not praise what is fine; report \
        only problems.";

    let consolidation_instruction = "You are the deciding architect. You received an initial \
        plan and an auditor's critiques. Evaluate each critique: accept the valid ones and \
        adjust the plan, reject the unfounded ones with a short justification. Then produce \
        the FINAL CONSOLIDATED PLAN, complete enough to be implemented to the letter, with \
        the same five sections as the original plan.";

    let implementation_instruction = "You are a senior software engineer focused on clean, \
        working implementation. Implement exactly what the consolidated plan specifies. \
        Return ONLY source code inside a fenced code block, with no prose outside it. \
        Include error handling and input validation where applicable, and tests when the \
        plan calls for them.";

    let review_instruction = "You are a code reviewer specialized in security and \
        robustness. Compare the implementation against the consolidated plan and assess: \
        conformance to the plan, vulnerabilities (injection, path traversal, exposed \
        secrets), logic bugs and race conditions, and test coverage. Classify every \
        finding as CRITICAL, HIGH, MEDIUM or LOW. Be direct.";

    vec![
        FlowStep::new("plan", "Claude", "Planning", "claude -p", plan_instruction)
            .with_input_template("{instruction}\n\nContext:\n{full_context}")
            .with_style("dark_goldenrod"),
        FlowStep::new(
            "critique",
            "Gemini",
            "Critique",
            "gemini -p {input}",
            critique_instruction,
        )
        .with_input_template("{instruction}\n\nProposed plan:\n{plan}")
        .with_style("dodger_blue1"),
        FlowStep::new(
            "final_plan",
            "Claude",
            "Consolidation",
            "claude -p",
            consolidation_instruction,
        )
        .with_input_template("{instruction}\n\nInitial plan:\n{plan}\n\nCritiques:\n{critique}")
        .with_style("dark_goldenrod"),
        FlowStep::new(
            "code",
            "Codex",
            "Implementation",
            "codex exec --skip-git-repo-check",
            implementation_instruction,
        )
        .with_input_template("{instruction}\n\nFinal plan:\n{final_plan}")
        .with_style("bright_black")
        .with_is_code(true),
        FlowStep::new(
            "review",
            "Gemini",
            "Final review",
            "gemini -p {input}",
            review_instruction,
        )
        .with_input_template("{instruction}\n\nConsolidated plan:\n{final_plan}\n\nCode:\n{code}")
        .with_style("dodger_blue1"),
    ]
}
