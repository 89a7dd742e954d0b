//! Flow step entity

/// Input template applied when a step does not define one.
pub const DEFAULT_INPUT_TEMPLATE: &str = "{instruction}\n\n{full_context}";

/// Per-step timeout applied when a step does not define one, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Presentation style hint applied when a step does not define one.
pub const DEFAULT_STYLE: &str = "blue";

/// Template names always provided by the orchestrator. A step key colliding
/// with one of these would shadow the built-in binding, so the collision is
/// rejected at parse time.
pub const RESERVED_TEMPLATE_KEYS: [&str; 4] =
    ["user_prompt", "full_context", "last_output", "instruction"];

/// One unit of execution in a flow: binds an agent role to an external CLI
/// command. Immutable after parsing.
///
/// `max_input_chars`, `max_output_chars` and `max_context_chars` are per-step
/// overrides; `None` inherits the process-wide limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowStep {
    pub key: String,
    pub agent_name: String,
    pub role_desc: String,
    pub command: String,
    pub instruction: String,
    pub input_template: String,
    pub style: String,
    /// When true, the step output must contain a fenced code block; the
    /// block's content replaces the output and a missing fence fails the
    /// step.
    pub is_code: bool,
    pub enabled: bool,
    pub timeout_secs: u64,
    pub max_input_chars: Option<usize>,
    pub max_output_chars: Option<usize>,
    pub max_context_chars: Option<usize>,
}

impl FlowStep {
    /// Create a step with defaults for every optional field.
    pub fn new(
        key: impl Into<String>,
        agent_name: impl Into<String>,
        role_desc: impl Into<String>,
        command: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            agent_name: agent_name.into(),
            role_desc: role_desc.into(),
            command: command.into(),
            instruction: instruction.into(),
            input_template: DEFAULT_INPUT_TEMPLATE.to_string(),
            style: DEFAULT_STYLE.to_string(),
            is_code: false,
            enabled: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_input_chars: None,
            max_output_chars: None,
            max_context_chars: None,
        }
    }

    pub fn with_input_template(mut self, template: impl Into<String>) -> Self {
        self.input_template = template.into();
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn with_is_code(mut self, is_code: bool) -> Self {
        self.is_code = is_code;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_max_input_chars(mut self, chars: usize) -> Self {
        self.max_input_chars = Some(chars);
        self
    }

    pub fn with_max_output_chars(mut self, chars: usize) -> Self {
        self.max_output_chars = Some(chars);
        self
    }

    pub fn with_max_context_chars(mut self, chars: usize) -> Self {
        self.max_context_chars = Some(chars);
        self
    }

    /// Whether `key` would shadow a built-in template binding.
    pub fn is_reserved_key(key: &str) -> bool {
        RESERVED_TEMPLATE_KEYS.contains(&key)
    }
}
