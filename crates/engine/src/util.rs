//! Internal helpers for input validation and normalization.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation logic so the engine enforces consistent invariants.

use crate::{EngineError, ResultEngine};

pub(crate) const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// Trim optional free text, mapping blank input to `None`.
pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Trim a required text field and reject it when blank.
pub(crate) fn normalize_required_text(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// Validate a client supplied idempotency key.
pub(crate) fn normalize_idempotency_key(key: &str) -> ResultEngine<String> {
    let key = normalize_required_text(key, "idempotency key")?;
    if key.chars().count() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(EngineError::InvalidInput(format!(
            "idempotency key must be at most {MAX_IDEMPOTENCY_KEY_LEN} characters"
        )));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_optional_text_is_none() {
        assert_eq!(normalize_optional_text(Some("   ")), None);
        assert_eq!(normalize_optional_text(None), None);
        assert_eq!(
            normalize_optional_text(Some(" thanks ")),
            Some("thanks".to_string())
        );
    }

    #[test]
    fn idempotency_key_rules() {
        assert_eq!(normalize_idempotency_key(" abc ").as_deref(), Ok("abc"));
        assert!(normalize_idempotency_key("  ").is_err());
        let long = "k".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1);
        assert!(normalize_idempotency_key(&long).is_err());
    }

    #[test]
    fn blank_required_text_is_invalid_input() {
        assert_eq!(
            normalize_required_text("  ", "member code"),
            Err(EngineError::InvalidInput(
                "member code must not be empty".to_string()
            ))
        );
        assert_eq!(
            normalize_required_text(" M-001 ", "member code").as_deref(),
            Ok("M-001")
        );
    }
}
