//! Variable set validation.
//!
//! Two independent checks guard a template:
//!
//! - **alignment**, run once when the template is built: the declared
//!   variables must equal the names the content references.
//! - **completeness**, run on every population: the supplied variables must
//!   equal the variables the template requires.
//!
//! Each check reports every difference it finds in a single error.

use std::collections::BTreeSet;

use crate::error::{PromptError, Result};

const EXTRACT_LEN: usize = 100;

/// Fails unless `declared` and `used` name exactly the same variables.
///
/// `source` is the template text shown, truncated, in the error.
pub fn check_alignment(
    declared: &BTreeSet<String>,
    used: &BTreeSet<String>,
    source: &str,
) -> Result<()> {
    let undeclared: BTreeSet<String> = used.difference(declared).cloned().collect();
    let unused: BTreeSet<String> = declared.difference(used).cloned().collect();

    if undeclared.is_empty() && unused.is_empty() {
        return Ok(());
    }
    Err(PromptError::Alignment {
        undeclared,
        unused,
        extract: truncate(source, EXTRACT_LEN),
    })
}

/// Fails unless `provided` names exactly the `required` variables.
pub fn check_completeness(required: &BTreeSet<String>, provided: &BTreeSet<String>) -> Result<()> {
    let missing: BTreeSet<String> = required.difference(provided).cloned().collect();
    let unexpected: BTreeSet<String> = provided.difference(required).cloned().collect();

    if missing.is_empty() && unexpected.is_empty() {
        return Ok(());
    }
    Err(PromptError::Completeness {
        missing,
        unexpected,
        required: required.clone(),
        provided: provided.clone(),
    })
}

/// Shortens `text` to `max` characters, marking the cut with `...`.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
