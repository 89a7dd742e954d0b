//! Flow-level validation
//!
//! Cross-step rules that cannot be checked on one step alone: key
//! uniqueness, reserved-name collisions, and template references restricted
//! to built-in names plus keys of strictly earlier steps.

use crate::core::error::FlowError;
use crate::flow::step::{FlowStep, RESERVED_TEMPLATE_KEYS};
use crate::prompt::template::extract_placeholders;
use std::collections::HashSet;

/// Validate an ordered list of parsed steps.
pub fn validate_flow_steps(steps: &[FlowStep]) -> Result<(), FlowError> {
    if steps.is_empty() {
        return Err(FlowError::EmptyFlow);
    }

    let duplicates = find_duplicate_keys(steps);
    if !duplicates.is_empty() {
        return Err(FlowError::DuplicateKeys {
            keys: duplicates.join(", "),
        });
    }

    let mut reserved: Vec<&str> = steps
        .iter()
        .map(|step| step.key.as_str())
        .filter(|key| FlowStep::is_reserved_key(key))
        .collect();
    reserved.sort_unstable();
    if !reserved.is_empty() {
        return Err(FlowError::ReservedKeys {
            keys: reserved.join(", "),
        });
    }

    validate_template_references(steps)
}

/// Every `{name}` in a step's template must be a built-in binding or the key
/// of an earlier step. Forward and self references are rejected.
fn validate_template_references(steps: &[FlowStep]) -> Result<(), FlowError> {
    let mut available: HashSet<&str> = RESERVED_TEMPLATE_KEYS.iter().copied().collect();

    for step in steps {
        let placeholders =
            extract_placeholders(&step.input_template).map_err(|source| FlowError::InvalidTemplate {
                step: step.key.clone(),
                source,
            })?;
        for name in &placeholders {
            if !available.contains(name.as_str()) {
                return Err(FlowError::UnknownTemplateVariable {
                    step: step.key.clone(),
                    name: name.clone(),
                });
            }
        }
        available.insert(step.key.as_str());
    }

    Ok(())
}

fn find_duplicate_keys(steps: &[FlowStep]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    for step in steps {
        if !seen.insert(step.key.as_str()) && !duplicates.contains(&step.key) {
            duplicates.push(step.key.clone());
        }
    }
    duplicates.sort_unstable();
    duplicates
}
