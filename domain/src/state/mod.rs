//! Append-only conversation state
//!
//! [`CouncilState`] holds the ordered history of one run. Turns are never
//! mutated or deleted; the aggregated context is derived on demand and
//! bounded by a char budget, dropping the oldest portion first.

/// Marker line substituted for the portion of the history dropped when the
/// aggregated context exceeds its char budget.
pub const CONTEXT_TRUNCATION_MARKER: &str = "[... contexto anterior truncado ...]";

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Human,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Human => "human",
            Role::Assistant => "assistant",
        }
    }

    /// Uppercase form used in context headers.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Human => "HUMAN",
            Role::Assistant => "ASSISTANT",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in the conversation history. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub agent_name: String,
    pub role: Role,
    pub content: String,
    pub role_desc: String,
}

/// Ordered history of turns for a single run, plus the derived bounded
/// aggregation. Single-threaded by contract: the orchestrator is the sole
/// writer.
#[derive(Debug, Clone)]
pub struct CouncilState {
    turns: Vec<Turn>,
    max_context_chars: usize,
}

impl CouncilState {
    pub fn new(max_context_chars: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_context_chars,
        }
    }

    pub fn add_turn(
        &mut self,
        agent_name: impl Into<String>,
        role: Role,
        content: impl Into<String>,
        role_desc: impl Into<String>,
    ) {
        self.turns.push(Turn {
            agent_name: agent_name.into(),
            role,
            content: content.into(),
            role_desc: role_desc.into(),
        });
    }

    /// Turns in append order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn max_context_chars(&self) -> usize {
        self.max_context_chars
    }

    /// Aggregated history within the state's own char budget.
    pub fn full_context(&self) -> String {
        self.full_context_with_limit(self.max_context_chars)
    }

    /// Aggregated history within an explicit char budget.
    ///
    /// Each turn is labeled with its agent and role. When the aggregation
    /// exceeds `max_chars`, the oldest prefix is dropped and replaced with
    /// [`CONTEXT_TRUNCATION_MARKER`]; the retained portion is the newest
    /// suffix of at most `max_chars` chars.
    pub fn full_context_with_limit(&self, max_chars: usize) -> String {
        if self.turns.is_empty() {
            return String::new();
        }

        let mut parts: Vec<String> = Vec::with_capacity(self.turns.len() * 2);
        for turn in &self.turns {
            let mut header = format!("--- {} ({})", turn.agent_name, turn.role.label());
            if !turn.role_desc.is_empty() {
                header.push_str(&format!(" [{}]", turn.role_desc));
            }
            header.push_str(" ---");
            parts.push(header);
            parts.push(turn.content.trim().to_string());
        }
        let full = parts.join("\n");

        let total_chars = full.chars().count();
        if total_chars <= max_chars {
            return full;
        }

        let suffix: String = full.chars().skip(total_chars - max_chars).collect();
        format!("{CONTEXT_TRUNCATION_MARKER}\n{suffix}")
    }
}
