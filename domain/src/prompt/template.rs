//! Input template rendering
//!
//! A deliberately small renderer: `{name}` placeholders, `{{` / `}}`
//! escapes, and loud failure on anything unknown. Unknown placeholders are
//! rejected at flow-parse time, so rendering the same inputs always yields
//! the same string.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unterminated placeholder starting at offset {offset}")]
    Unterminated { offset: usize },

    #[error("empty placeholder at offset {offset}")]
    EmptyPlaceholder { offset: usize },

    #[error("invalid placeholder name '{name}'")]
    InvalidName { name: String },

    #[error("unknown template variable '{name}'")]
    UnknownVariable { name: String },

    #[error("stray '}}' at offset {offset}")]
    StrayClose { offset: usize },
}

enum Token<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

/// The distinct placeholder names of `template`, in first-use order.
pub fn extract_placeholders(template: &str) -> Result<Vec<String>, TemplateError> {
    let mut names: Vec<String> = Vec::new();
    for token in tokenize(template)? {
        if let Token::Placeholder(name) = token {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}

/// Substitute every placeholder from `context`.
///
/// Fails on a name missing from `context`; given validated templates this
/// only happens on a programming defect, never on user input.
pub fn render_template(
    template: &str,
    context: &HashMap<String, String>,
) -> Result<String, TemplateError> {
    let mut rendered = String::with_capacity(template.len());
    for token in tokenize(template)? {
        match token {
            Token::Literal(text) => rendered.push_str(text),
            Token::Placeholder(name) => {
                let value = context
                    .get(name)
                    .ok_or_else(|| TemplateError::UnknownVariable {
                        name: name.to_string(),
                    })?;
                rendered.push_str(value);
            }
        }
    }
    Ok(rendered)
}

fn tokenize(template: &str) -> Result<Vec<Token<'_>>, TemplateError> {
    let bytes = template.as_bytes();
    let mut tokens: Vec<Token<'_>> = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                tokens.push(Token::Literal(&template[literal_start..=i]));
                i += 2;
                literal_start = i;
            }
            b'{' => {
                if literal_start < i {
                    tokens.push(Token::Literal(&template[literal_start..i]));
                }
                let close = template[i + 1..]
                    .find('}')
                    .map(|offset| i + 1 + offset)
                    .ok_or(TemplateError::Unterminated { offset: i })?;
                let name = &template[i + 1..close];
                if name.is_empty() {
                    return Err(TemplateError::EmptyPlaceholder { offset: i });
                }
                if !is_valid_name(name) {
                    return Err(TemplateError::InvalidName {
                        name: name.to_string(),
                    });
                }
                tokens.push(Token::Placeholder(name));
                i = close + 1;
                literal_start = i;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                tokens.push(Token::Literal(&template[literal_start..=i]));
                i += 2;
                literal_start = i;
            }
            b'}' => return Err(TemplateError::StrayClose { offset: i }),
            _ => i += 1,
        }
    }

    if literal_start < bytes.len() {
        tokens.push(Token::Literal(&template[literal_start..]));
    }
    Ok(tokens)
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
