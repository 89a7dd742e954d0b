//! Flow configuration loading and validation
//!
//! Resolution cascade (highest priority first):
//! 1. Explicit `--flow-config` path
//! 2. `FLOW_CONFIG` environment variable
//! 3. `./flow.json` in the current directory
//! 4. `<COUNCIL_HOME>/flow.json`
//! 5. Built-in default flow
//!
//! Sources 2 and 3 are implicit: a file that happens to be lying around (or
//! an env var set by something else) can run commands on this host, so the
//! front-end must confirm implicit flows interactively and refuse them in
//! non-interactive mode.

use crate::config::default_flow::default_flow_steps;
use crate::signature::{self, SignatureError, VerifyOutcome};
use council_application::ports::audit::{events, AuditLevel, AuditLogger};
use council_domain::{
    validate_command, validate_flow_steps, CommandPolicyError, FlowError, FlowStep,
    DEFAULT_INPUT_TEMPLATE, DEFAULT_STYLE, DEFAULT_TIMEOUT_SECS,
};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const FLOW_CONFIG_ENV_VAR: &str = "FLOW_CONFIG";
pub const FLOW_FILE_NAME: &str = "flow.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("flow config file not found ({source_label}): {path}")]
    NotFound { source_label: String, path: PathBuf },

    #[error("flow config path ({source_label}) is not a regular file: {path}")]
    NotAFile { source_label: String, path: PathBuf },

    #[error("failed to read flow config '{path}': {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("flow config '{path}' is not valid UTF-8 JSON: {reason}")]
    InvalidJson { path: PathBuf, reason: String },

    #[error("invalid flow format: expected a list of steps or an object with a 'steps' key")]
    InvalidFormat,

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error("signature verification failed for '{path}': {source}")]
    Signature {
        path: PathBuf,
        #[source]
        source: SignatureError,
    },
}

/// Where the flow definition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowSource {
    Cli,
    Env,
    Cwd,
    User,
    Default,
}

impl FlowSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowSource::Cli => "cli",
            FlowSource::Env => "env",
            FlowSource::Cwd => "cwd",
            FlowSource::User => "user",
            FlowSource::Default => "default",
        }
    }

    /// Implicit sources require explicit confirmation before executing.
    pub fn is_implicit(&self) -> bool {
        matches!(self, FlowSource::Env | FlowSource::Cwd)
    }
}

impl std::fmt::Display for FlowSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of the resolution cascade. `path: None` means the built-in
/// default flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFlowConfig {
    pub path: Option<PathBuf>,
    pub source: FlowSource,
}

/// Cascade inputs. [`FlowLocator::from_env`] captures the live process
/// environment; tests construct the struct directly.
#[derive(Debug, Clone)]
pub struct FlowLocator {
    pub env_path: Option<String>,
    pub cwd_flow_path: PathBuf,
    pub user_flow_path: PathBuf,
}

impl FlowLocator {
    pub fn from_env() -> Self {
        Self {
            env_path: std::env::var(FLOW_CONFIG_ENV_VAR)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            cwd_flow_path: std::env::current_dir()
                .map(|dir| dir.join(FLOW_FILE_NAME))
                .unwrap_or_else(|_| PathBuf::from(FLOW_FILE_NAME)),
            user_flow_path: crate::paths::user_flow_path(&crate::paths::council_home()),
        }
    }

    /// Walk the cascade. Explicit and env paths must exist; the cwd and user
    /// candidates are picked up only when present.
    pub fn resolve(&self, cli_path: Option<&str>) -> Result<ResolvedFlowConfig, ConfigError> {
        if let Some(raw) = cli_path.map(str::trim).filter(|path| !path.is_empty()) {
            let path = validate_config_path(raw, "--flow-config")?;
            return Ok(ResolvedFlowConfig {
                path: Some(path),
                source: FlowSource::Cli,
            });
        }

        if let Some(raw) = self.env_path.as_deref() {
            let path = validate_config_path(raw, FLOW_CONFIG_ENV_VAR)?;
            return Ok(ResolvedFlowConfig {
                path: Some(path),
                source: FlowSource::Env,
            });
        }

        if self.cwd_flow_path.exists() {
            return Ok(ResolvedFlowConfig {
                path: Some(self.cwd_flow_path.clone()),
                source: FlowSource::Cwd,
            });
        }

        if self.user_flow_path.exists() {
            return Ok(ResolvedFlowConfig {
                path: Some(self.user_flow_path.clone()),
                source: FlowSource::User,
            });
        }

        Ok(ResolvedFlowConfig {
            path: None,
            source: FlowSource::Default,
        })
    }
}

fn validate_config_path(raw: &str, source_label: &str) -> Result<PathBuf, ConfigError> {
    let path = PathBuf::from(raw);
    if !path.exists() {
        return Err(ConfigError::NotFound {
            source_label: source_label.to_string(),
            path,
        });
    }
    if !path.is_file() {
        return Err(ConfigError::NotAFile {
            source_label: source_label.to_string(),
            path,
        });
    }
    Ok(path)
}

/// Options governing one flow load.
pub struct LoadOptions<'a> {
    pub require_signature: bool,
    pub trusted_keys_dir: PathBuf,
    /// PATH lookup used for the discoverability check; tests stub it.
    pub binary_lookup: fn(&str) -> bool,
    pub audit: &'a dyn AuditLogger,
}

/// Load and fully validate the flow selected by `resolved`.
pub fn load_flow_steps(
    resolved: &ResolvedFlowConfig,
    options: &LoadOptions<'_>,
) -> Result<Vec<FlowStep>, ConfigError> {
    let Some(path) = &resolved.path else {
        let steps = default_flow_steps();
        options.audit.emit(
            AuditLevel::Info,
            events::FLOW_LOAD,
            json!({ "source": resolved.source.as_str(), "planned_steps": steps.len() }),
        );
        return Ok(steps);
    };

    let bytes = std::fs::read(path).map_err(|err| ConfigError::Unreadable {
        path: path.clone(),
        reason: err.to_string(),
    })?;

    match signature::verify_flow_file(
        path,
        &bytes,
        options.require_signature,
        &options.trusted_keys_dir,
        None,
    ) {
        Ok(VerifyOutcome::Verified { key_id }) => options.audit.emit(
            AuditLevel::Info,
            events::SIGNATURE_VERIFIED,
            json!({ "path": path.display().to_string(), "key_id": key_id }),
        ),
        Ok(VerifyOutcome::Unsigned) => options.audit.emit(
            AuditLevel::Warning,
            events::SIGNATURE_MISSING,
            json!({ "path": path.display().to_string() }),
        ),
        Err(source) => {
            return Err(ConfigError::Signature {
                path: path.clone(),
                source,
            })
        }
    }

    let payload: Value = serde_json::from_slice(&bytes).map_err(|err| ConfigError::InvalidJson {
        path: path.clone(),
        reason: err.to_string(),
    })?;

    let steps = parse_flow_payload(&payload)?;
    ensure_binaries_discoverable(&steps, options.binary_lookup)?;

    options.audit.emit(
        AuditLevel::Info,
        events::FLOW_LOAD,
        json!({
            "source": resolved.source.as_str(),
            "path": path.display().to_string(),
            "planned_steps": steps.len(),
        }),
    );
    Ok(steps)
}

/// Parse a flow document: a top-level list of steps or an object with a
/// `steps` list. Unknown step fields are ignored for forward compatibility;
/// every known field is strictly typed.
pub fn parse_flow_payload(payload: &Value) -> Result<Vec<FlowStep>, ConfigError> {
    let raw_steps = match payload {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("steps") {
            Some(Value::Array(items)) => items,
            _ => return Err(ConfigError::InvalidFormat),
        },
        _ => return Err(ConfigError::InvalidFormat),
    };

    let mut steps = Vec::with_capacity(raw_steps.len());
    for (index, raw) in raw_steps.iter().enumerate() {
        steps.push(parse_step(raw, index + 1)?);
    }

    validate_flow_steps(&steps)?;
    Ok(steps)
}

fn parse_step(raw: &Value, position: usize) -> Result<FlowStep, ConfigError> {
    let object = raw.as_object().ok_or_else(|| FlowError::InvalidStep {
        position,
        reason: "expected a JSON object".to_string(),
    })?;

    let key = get_string(object, &["key", "id"], false, position)?
        .unwrap_or_else(|| format!("step_{position}"));
    let agent_name = require_string(object, &["agent_name", "agent"], position)?;
    let role_desc = require_string(object, &["role_desc", "role"], position)?;

    let command = require_string(object, &["command"], position)?;
    validate_command(&command).map_err(|source: CommandPolicyError| FlowError::CommandRejected {
        position,
        source,
    })?;

    let instruction = require_string(object, &["instruction"], position)?;
    let input_template = get_string(object, &["input_template"], false, position)?
        .unwrap_or_else(|| DEFAULT_INPUT_TEMPLATE.to_string());
    let style = get_string(object, &["style"], false, position)?
        .unwrap_or_else(|| DEFAULT_STYLE.to_string());

    let is_code = get_bool(object, "is_code", false, position)?;
    let enabled = get_bool(object, "enabled", true, position)?;

    let timeout_secs = get_positive_int(object, "timeout", position)?
        .map(|value| value as u64)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let max_input_chars = get_positive_int(object, "max_input_chars", position)?;
    let max_output_chars = get_positive_int(object, "max_output_chars", position)?;
    let max_context_chars = get_positive_int(object, "max_context_chars", position)?;

    Ok(FlowStep {
        key,
        agent_name,
        role_desc,
        command,
        instruction,
        input_template,
        style,
        is_code,
        enabled,
        timeout_secs,
        max_input_chars,
        max_output_chars,
        max_context_chars,
    })
}

fn require_string(
    object: &Map<String, Value>,
    field_names: &[&str],
    position: usize,
) -> Result<String, ConfigError> {
    match get_string(object, field_names, true, position)? {
        Some(value) => Ok(value),
        None => {
            let expected = field_names
                .iter()
                .map(|name| format!("'{name}'"))
                .collect::<Vec<_>>()
                .join(" or ");
            Err(FlowError::InvalidStep {
                position,
                reason: format!("missing required field ({expected})"),
            }
            .into())
        }
    }
}

/// Fetch the first present alias. A blank optional value counts as absent so
/// defaults apply.
fn get_string(
    object: &Map<String, Value>,
    field_names: &[&str],
    required: bool,
    position: usize,
) -> Result<Option<String>, ConfigError> {
    for name in field_names {
        let Some(value) = object.get(*name) else {
            continue;
        };
        let Some(text) = value.as_str() else {
            return Err(FlowError::InvalidStep {
                position,
                reason: format!("field '{name}' must be a string"),
            }
            .into());
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            if required {
                return Err(FlowError::InvalidStep {
                    position,
                    reason: format!("field '{name}' cannot be empty"),
                }
                .into());
            }
            return Ok(None);
        }
        return Ok(Some(trimmed.to_string()));
    }
    Ok(None)
}

fn get_bool(
    object: &Map<String, Value>,
    field_name: &str,
    default: bool,
    position: usize,
) -> Result<bool, ConfigError> {
    match object.get(field_name) {
        None => Ok(default),
        Some(Value::Bool(value)) => Ok(*value),
        Some(_) => Err(FlowError::InvalidStep {
            position,
            reason: format!("field '{field_name}' must be a boolean"),
        }
        .into()),
    }
}

fn get_positive_int(
    object: &Map<String, Value>,
    field_name: &str,
    position: usize,
) -> Result<Option<usize>, ConfigError> {
    let Some(value) = object.get(field_name) else {
        return Ok(None);
    };
    let invalid = || {
        ConfigError::Flow(FlowError::InvalidStep {
            position,
            reason: format!("field '{field_name}' must be a positive integer"),
        })
    };
    let number = value.as_i64().ok_or_else(invalid)?;
    if number <= 0 {
        return Err(invalid());
    }
    Ok(Some(number as usize))
}

/// Every non-API-only binary must resolve on the executable search path.
fn ensure_binaries_discoverable(
    steps: &[FlowStep],
    binary_lookup: fn(&str) -> bool,
) -> Result<(), ConfigError> {
    for (index, step) in steps.iter().enumerate() {
        let Some(tokens) = shlex::split(&step.command) else {
            continue;
        };
        let Some(binary) = tokens.first() else {
            continue;
        };
        if council_domain::is_api_only_binary(binary) {
            continue;
        }
        if !binary_lookup(binary) {
            return Err(FlowError::InvalidStep {
                position: index + 1,
                reason: format!("command binary '{binary}' was not found on PATH"),
            }
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_application::ports::audit::NoAudit;
    use serde_json::json;
    use std::fs;

    fn any_binary(_binary: &str) -> bool {
        true
    }

    fn no_binary(_binary: &str) -> bool {
        false
    }

    fn options_with(dir: &Path, require_signature: bool) -> LoadOptions<'static> {
        LoadOptions {
            require_signature,
            trusted_keys_dir: dir.join("trusted_flow_keys"),
            binary_lookup: any_binary,
            audit: &NoAudit,
        }
    }

    fn resolved_file(path: &Path) -> ResolvedFlowConfig {
        ResolvedFlowConfig {
            path: Some(path.to_path_buf()),
            source: FlowSource::Cli,
        }
    }

    // ==================== payload parsing ====================

    #[test]
    fn test_parses_object_with_steps_and_aliases() {
        let payload = json!({
            "steps": [{
                "id": "plan",
                "agent": "Claude",
                "role": "Planning",
                "command": "claude -p",
                "instruction": "Plan it.",
            }]
        });
        let steps = parse_flow_payload(&payload).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].key, "plan");
        assert_eq!(steps[0].agent_name, "Claude");
        assert_eq!(steps[0].role_desc, "Planning");
        assert_eq!(steps[0].input_template, DEFAULT_INPUT_TEMPLATE);
        assert_eq!(steps[0].timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(steps[0].enabled);
    }

    #[test]
    fn test_parses_bare_list_and_defaults_keys() {
        let payload = json!([
            {
                "agent_name": "Claude",
                "role_desc": "Planning",
                "command": "claude -p",
                "instruction": "Plan it.",
            },
            {
                "agent_name": "Gemini",
                "role_desc": "Review",
                "command": "gemini -p {input}",
                "instruction": "Review it.",
                "timeout": 30,
                "is_code": false,
                "max_context_chars": 5000,
            },
        ]);
        let steps = parse_flow_payload(&payload).unwrap();
        assert_eq!(steps[0].key, "step_1");
        assert_eq!(steps[1].key, "step_2");
        assert_eq!(steps[1].timeout_secs, 30);
        assert_eq!(steps[1].max_context_chars, Some(5000));
    }

    #[test]
    fn test_rejects_bad_top_level_shapes() {
        for payload in [json!("nope"), json!(42), json!({"not_steps": []})] {
            assert!(matches!(
                parse_flow_payload(&payload),
                Err(ConfigError::InvalidFormat)
            ));
        }
    }

    #[test]
    fn test_rejects_empty_step_list() {
        assert!(matches!(
            parse_flow_payload(&json!([])),
            Err(ConfigError::Flow(FlowError::EmptyFlow))
        ));
    }

    #[test]
    fn test_rejects_missing_required_fields() {
        let payload = json!([{ "agent_name": "Claude", "command": "claude -p" }]);
        let err = parse_flow_payload(&payload).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Flow(FlowError::InvalidStep { position: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_wrong_field_types() {
        let base = json!({
            "agent_name": "Claude",
            "role_desc": "Planning",
            "command": "claude -p",
            "instruction": "Plan it.",
        });

        let mut bad_bool = base.clone();
        bad_bool["is_code"] = json!("yes");
        assert!(parse_flow_payload(&json!([bad_bool])).is_err());

        let mut bad_int = base.clone();
        bad_int["timeout"] = json!("120");
        assert!(parse_flow_payload(&json!([bad_int])).is_err());

        let mut zero_int = base.clone();
        zero_int["max_input_chars"] = json!(0);
        assert!(parse_flow_payload(&json!([zero_int])).is_err());

        let mut negative = base;
        negative["max_output_chars"] = json!(-3);
        assert!(parse_flow_payload(&json!([negative])).is_err());
    }

    #[test]
    fn test_rejects_forbidden_command_at_parse_time() {
        let payload = json!([{
            "agent_name": "Claude",
            "role_desc": "Planning",
            "command": "claude -p ; rm -rf /",
            "instruction": "Plan it.",
        }]);
        let err = parse_flow_payload(&payload).unwrap_err();
        // the error names the offending operator
        assert!(err.to_string().contains(';'), "error was: {err}");
        assert!(matches!(
            err,
            ConfigError::Flow(FlowError::CommandRejected { position: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_duplicate_and_reserved_keys() {
        let duplicate = json!([
            {"key": "a", "agent_name": "X", "role_desc": "R", "command": "claude -p", "instruction": "i"},
            {"key": "a", "agent_name": "Y", "role_desc": "R", "command": "claude -p", "instruction": "i"},
        ]);
        assert!(matches!(
            parse_flow_payload(&duplicate),
            Err(ConfigError::Flow(FlowError::DuplicateKeys { .. }))
        ));

        let reserved = json!([
            {"key": "full_context", "agent_name": "X", "role_desc": "R", "command": "claude -p", "instruction": "i"},
        ]);
        assert!(matches!(
            parse_flow_payload(&reserved),
            Err(ConfigError::Flow(FlowError::ReservedKeys { .. }))
        ));
    }

    #[test]
    fn test_rejects_unknown_template_placeholder() {
        let payload = json!([{
            "key": "plan",
            "agent_name": "X",
            "role_desc": "R",
            "command": "claude -p",
            "instruction": "i",
            "input_template": "{instruction}\n\n{not_a_step}",
        }]);
        assert!(matches!(
            parse_flow_payload(&payload),
            Err(ConfigError::Flow(FlowError::UnknownTemplateVariable { .. }))
        ));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let payload = json!([{
            "agent_name": "Claude",
            "role_desc": "Planning",
            "command": "claude -p",
            "instruction": "Plan it.",
            "future_field": {"anything": true},
        }]);
        assert!(parse_flow_payload(&payload).is_ok());
    }

    // ==================== resolution cascade ====================

    #[test]
    fn test_cascade_prefers_cli_then_env_then_cwd_then_user() {
        let dir = tempfile::tempdir().unwrap();
        let cli = dir.path().join("cli.json");
        let env = dir.path().join("env.json");
        let cwd = dir.path().join("flow.json");
        let user = dir.path().join("home-flow.json");
        for path in [&cli, &env, &cwd, &user] {
            fs::write(path, "[]").unwrap();
        }

        let locator = FlowLocator {
            env_path: Some(env.display().to_string()),
            cwd_flow_path: cwd.clone(),
            user_flow_path: user.clone(),
        };

        let picked = locator.resolve(Some(cli.to_str().unwrap())).unwrap();
        assert_eq!(picked.source, FlowSource::Cli);
        assert_eq!(picked.path.as_deref(), Some(cli.as_path()));

        let picked = locator.resolve(None).unwrap();
        assert_eq!(picked.source, FlowSource::Env);
        assert_eq!(picked.path.as_deref(), Some(env.as_path()));

        let locator = FlowLocator {
            env_path: None,
            ..locator
        };
        let picked = locator.resolve(None).unwrap();
        assert_eq!(picked.source, FlowSource::Cwd);
        assert_eq!(picked.path.as_deref(), Some(cwd.as_path()));

        let locator = FlowLocator {
            cwd_flow_path: dir.path().join("absent.json"),
            ..locator
        };
        let picked = locator.resolve(None).unwrap();
        assert_eq!(picked.source, FlowSource::User);
        assert_eq!(picked.path.as_deref(), Some(user.as_path()));

        let locator = FlowLocator {
            user_flow_path: dir.path().join("also-absent.json"),
            ..locator
        };
        let picked = locator.resolve(None).unwrap();
        assert_eq!(picked.source, FlowSource::Default);
        assert_eq!(picked.path, None);
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let locator = FlowLocator {
            env_path: None,
            cwd_flow_path: PathBuf::from("/nonexistent/flow.json"),
            user_flow_path: PathBuf::from("/nonexistent/home/flow.json"),
        };
        assert!(matches!(
            locator.resolve(Some("/nonexistent/cli.json")),
            Err(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn test_implicit_sources() {
        assert!(FlowSource::Env.is_implicit());
        assert!(FlowSource::Cwd.is_implicit());
        assert!(!FlowSource::Cli.is_implicit());
        assert!(!FlowSource::User.is_implicit());
        assert!(!FlowSource::Default.is_implicit());
    }

    // ==================== load_flow_steps ====================

    #[test]
    fn test_default_source_yields_builtin_flow() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = ResolvedFlowConfig {
            path: None,
            source: FlowSource::Default,
        };
        let steps = load_flow_steps(&resolved, &options_with(dir.path(), false)).unwrap();
        assert_eq!(steps.len(), 5);
    }

    #[test]
    fn test_loads_valid_flow_file() {
        let dir = tempfile::tempdir().unwrap();
        let flow = dir.path().join("flow.json");
        fs::write(
            &flow,
            serde_json::to_vec(&json!({
                "steps": [{
                    "key": "plan",
                    "agent_name": "Claude",
                    "role_desc": "Planning",
                    "command": "claude -p",
                    "instruction": "Plan it.",
                }]
            }))
            .unwrap(),
        )
        .unwrap();

        let steps =
            load_flow_steps(&resolved_file(&flow), &options_with(dir.path(), false)).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].key, "plan");
    }

    #[test]
    fn test_undiscoverable_binary_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let flow = dir.path().join("flow.json");
        fs::write(
            &flow,
            br#"[{"agent_name":"X","role_desc":"R","command":"claude -p","instruction":"i"}]"#,
        )
        .unwrap();

        let mut options = options_with(dir.path(), false);
        options.binary_lookup = no_binary;
        let err = load_flow_steps(&resolved_file(&flow), &options).unwrap_err();
        assert!(err.to_string().contains("not found on PATH"));
    }

    #[test]
    fn test_api_only_binary_skips_discoverability() {
        let dir = tempfile::tempdir().unwrap();
        let flow = dir.path().join("flow.json");
        fs::write(
            &flow,
            br#"[{"agent_name":"X","role_desc":"R","command":"deepseek chat","instruction":"i"}]"#,
        )
        .unwrap();

        let mut options = options_with(dir.path(), false);
        options.binary_lookup = no_binary;
        assert!(load_flow_steps(&resolved_file(&flow), &options).is_ok());
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let flow = dir.path().join("flow.json");
        fs::write(&flow, b"{not json").unwrap();
        let err =
            load_flow_steps(&resolved_file(&flow), &options_with(dir.path(), false)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidJson { .. }));
    }

    #[test]
    fn test_signature_required_without_sidecar_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let flow = dir.path().join("flow.json");
        fs::write(
            &flow,
            br#"[{"agent_name":"X","role_desc":"R","command":"claude -p","instruction":"i"}]"#,
        )
        .unwrap();

        let err =
            load_flow_steps(&resolved_file(&flow), &options_with(dir.path(), true)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Signature {
                source: SignatureError::Missing { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_signed_and_trusted_flow_loads_in_strict_mode() {
        let dir = tempfile::tempdir().unwrap();
        let flow = dir.path().join("flow.json");
        fs::write(
            &flow,
            br#"[{"agent_name":"X","role_desc":"R","command":"claude -p","instruction":"i"}]"#,
        )
        .unwrap();

        let private_key = dir.path().join("signer.pem");
        let public_key = dir.path().join("signer.pub.pem");
        signature::generate_keypair(&private_key, &public_key, false).unwrap();
        let trusted_dir = dir.path().join("trusted_flow_keys");
        signature::trust_public_key(&trusted_dir, &public_key, "signer", false).unwrap();
        signature::sign_flow_file(&flow, &private_key, "signer", false).unwrap();

        let steps =
            load_flow_steps(&resolved_file(&flow), &options_with(dir.path(), true)).unwrap();
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn test_tampered_signed_flow_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let flow = dir.path().join("flow.json");
        fs::write(
            &flow,
            br#"[{"agent_name":"X","role_desc":"R","command":"claude -p","instruction":"i"}]"#,
        )
        .unwrap();

        let private_key = dir.path().join("signer.pem");
        let public_key = dir.path().join("signer.pub.pem");
        signature::generate_keypair(&private_key, &public_key, false).unwrap();
        let trusted_dir = dir.path().join("trusted_flow_keys");
        signature::trust_public_key(&trusted_dir, &public_key, "signer", false).unwrap();
        signature::sign_flow_file(&flow, &private_key, "signer", false).unwrap();

        // edit after signing
        fs::write(
            &flow,
            br#"[{"agent_name":"Evil","role_desc":"R","command":"claude -p","instruction":"i"}]"#,
        )
        .unwrap();

        let err =
            load_flow_steps(&resolved_file(&flow), &options_with(dir.path(), true)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Signature {
                source: SignatureError::BadSignature { .. },
                ..
            }
        ));
    }
}
