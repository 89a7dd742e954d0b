//! Host binary prerequisites
//!
//! Before a flow runs (and for `council doctor`), every distinct binary of
//! its enabled steps must resolve on PATH. API-only binaries are exempt. A
//! binary resolved inside a world-writable directory is flagged as a
//! security warning.

use council_domain::{is_api_only_binary, FlowStep};
use std::path::{Path, PathBuf};

/// Resolution result for one required binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryStatus {
    pub binary: String,
    pub resolved_path: Option<PathBuf>,
    pub is_available: bool,
    pub world_writable_location: bool,
}

/// Whether `binary` resolves on the executable search path.
pub fn binary_on_path(binary: &str) -> bool {
    which::which(binary).is_ok()
}

/// Distinct binaries required by the enabled steps, in first-use order.
/// API-only binaries never appear: there is nothing to resolve for them.
pub fn collect_required_binaries(steps: &[FlowStep]) -> Vec<String> {
    let mut required: Vec<String> = Vec::new();
    for step in steps {
        if !step.enabled {
            continue;
        }
        let Some(binary) = extract_binary_name(&step.command) else {
            continue;
        };
        if is_api_only_binary(&binary) || required.contains(&binary) {
            continue;
        }
        required.push(binary);
    }
    required
}

/// Resolve every required binary and inspect its location.
pub fn evaluate_flow_prerequisites(steps: &[FlowStep]) -> Vec<BinaryStatus> {
    collect_required_binaries(steps)
        .into_iter()
        .map(|binary| match which::which(&binary) {
            Err(_) => BinaryStatus {
                binary,
                resolved_path: None,
                is_available: false,
                world_writable_location: false,
            },
            Ok(path) => {
                let resolved = path.canonicalize().unwrap_or(path);
                let world_writable = resolved
                    .parent()
                    .map(is_world_writable_dir)
                    .unwrap_or(false);
                BinaryStatus {
                    binary,
                    resolved_path: Some(resolved),
                    is_available: true,
                    world_writable_location: world_writable,
                }
            }
        })
        .collect()
}

pub fn find_missing(statuses: &[BinaryStatus]) -> Vec<&BinaryStatus> {
    statuses.iter().filter(|status| !status.is_available).collect()
}

pub fn find_world_writable(statuses: &[BinaryStatus]) -> Vec<&BinaryStatus> {
    statuses
        .iter()
        .filter(|status| status.is_available && status.world_writable_location)
        .collect()
}

fn extract_binary_name(command: &str) -> Option<String> {
    let tokens = shlex::split(command)?;
    let first = tokens.first()?;
    let name = Path::new(first).file_name()?.to_string_lossy().trim().to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

pub(crate) fn is_world_writable_dir(dir: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        dir.metadata()
            .map(|meta| meta.mode() & 0o002 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(command: &str) -> FlowStep {
        FlowStep::new("key", "Agent", "Role", command, "Instruction")
    }

    #[test]
    fn test_collect_dedups_and_preserves_order() {
        let steps = vec![
            step("claude -p"),
            step("gemini -p {input}"),
            FlowStep::new("b", "A", "R", "claude -p", "I"),
        ];
        assert_eq!(collect_required_binaries(&steps), vec!["claude", "gemini"]);
    }

    #[test]
    fn test_collect_skips_disabled_steps() {
        let steps = vec![step("claude -p").with_enabled(false), step("gemini -p")];
        assert_eq!(collect_required_binaries(&steps), vec!["gemini"]);
    }

    #[test]
    fn test_collect_skips_api_only_binaries() {
        let steps = vec![step("deepseek chat"), step("claude -p")];
        assert_eq!(collect_required_binaries(&steps), vec!["claude"]);
    }

    #[test]
    fn test_collect_ignores_unparseable_commands() {
        let steps = vec![step("tool 'unterminated")];
        assert!(collect_required_binaries(&steps).is_empty());
    }

    #[test]
    fn test_evaluate_flags_missing_binary() {
        let steps = vec![step("claude -p")];
        // patching the command to something certainly absent
        let mut steps = steps;
        steps[0].command = "binary-that-cannot-exist-anywhere -x".to_string();
        let statuses = evaluate_flow_prerequisites(&steps);
        assert_eq!(statuses.len(), 1);
        assert!(!statuses[0].is_available);
        assert_eq!(find_missing(&statuses).len(), 1);
    }

    #[test]
    fn test_evaluate_resolves_present_binary() {
        // `sh` exists on any POSIX host this suite runs on
        let steps = vec![step("sh -c")];
        let statuses = evaluate_flow_prerequisites(&steps);
        assert_eq!(statuses.len(), 1);
        assert!(statuses[0].is_available);
        assert!(statuses[0].resolved_path.is_some());
        assert!(find_missing(&statuses).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_world_writable_detection() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_world_writable_dir(dir.path()));
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o777)).unwrap();
        assert!(is_world_writable_dir(dir.path()));
    }
}
