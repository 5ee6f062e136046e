//! Pipeline error types for declaration and invocation failures.
//!
//! Two error types cover the full pipeline lifecycle:
//!
//! - [`DeclarationError`]: problems found while a pipeline is being declared
//!   (unreadable stage signatures, conflicting ranking shortcuts, etc.). These
//!   are fatal: no pipeline is produced.
//! - [`InvocationError`]: failures the framework itself raises while a built
//!   pipeline runs (argument binding, unorderable elements). Errors raised by
//!   user stage functions are never converted into this type.
//!
//! Both types carry a stable [`ErrorCode`] for programmatic matching, a
//! human-readable `message`, and an optional `hint` suggesting a fix.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::error_code::ErrorCode;

// ─── Declaration-time errors ────────────────────────────────────────────────

/// A problem found in a pipeline declaration before it can be built.
///
/// # Display format
///
/// ```text
/// [conflicting_ranking] /sort: sort and an explicit preference are mutually exclusive
/// ```
///
/// # JSON format
///
/// ```json
/// {
///   "code": "conflicting_ranking",
///   "path": "/sort",
///   "message": "sort and an explicit preference are mutually exclusive",
///   "hint": "Remove the preference stage or set sort to false"
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("[{code}] {path}: {message}")]
pub struct DeclarationError {
    /// Stable error code for programmatic matching.
    pub code: ErrorCode,

    /// JSON pointer into the declaration identifying the problematic part.
    ///
    /// Examples: `"/preference"`, `"/sort_key"`, `"/config/limit"`.
    pub path: String,

    /// Human-readable description of the problem.
    pub message: String,

    /// Optional suggestion for how to fix the problem.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl DeclarationError {
    /// Create a new declaration error.
    pub fn new(code: ErrorCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
            message: message.into(),
            hint: None,
        }
    }

    /// Attach a hint suggesting how to fix the problem.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ─── Invocation-time errors ─────────────────────────────────────────────────

/// A failure raised by the framework while a built pipeline was running.
///
/// # Display format
///
/// ```text
/// [missing_argument] (stage: bind): missing required positional argument 'arg_0'
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("[{code}] (stage: {stage}): {message}")]
pub struct InvocationError {
    /// Stable error code for programmatic matching.
    pub code: ErrorCode,

    /// Name of the pipeline step that failed (`"bind"`, `"rank"`, ...).
    pub stage: String,

    /// Human-readable description of the failure.
    pub message: String,

    /// Optional suggestion for how to fix or work around the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl InvocationError {
    /// Create a new invocation error.
    pub fn new(code: ErrorCode, stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            stage: stage.into(),
            message: message.into(),
            hint: None,
        }
    }

    /// Attach a hint suggesting how to fix or work around the failure.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─── DeclarationError ───────────────────────────────────────────────

    #[test]
    fn test_declaration_error_display() {
        let err = DeclarationError::new(
            ErrorCode::OrphanReverse,
            "/sort_reverse",
            "sort_reverse requires sort, sort_key or a preference",
        );
        assert_eq!(
            err.to_string(),
            "[orphan_reverse] /sort_reverse: sort_reverse requires sort, sort_key or a preference"
        );
    }

    #[test]
    fn test_declaration_error_with_hint() {
        let err = DeclarationError::new(
            ErrorCode::ConflictingRanking,
            "/sort_key",
            "sort and sort_key are mutually exclusive",
        )
        .with_hint("Drop the sort flag; sort_key already orders elements");

        assert_eq!(
            err.hint.as_deref(),
            Some("Drop the sort flag; sort_key already orders elements")
        );
    }

    #[test]
    fn test_declaration_error_json_format() {
        let err = DeclarationError::new(
            ErrorCode::UnknownField,
            "/config/sortt",
            "unrecognized field \"sortt\"",
        );

        let value: serde_json::Value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["code"], "unknown_field");
        assert_eq!(value["path"], "/config/sortt");
        // hint is None → should be absent from JSON
        assert!(value.get("hint").is_none());
    }

    #[test]
    fn test_declaration_error_is_std_error() {
        let err = DeclarationError::new(ErrorCode::InspectionFailed, "/action", "opaque");
        let _: &dyn std::error::Error = &err;
    }

    // ─── InvocationError ────────────────────────────────────────────────

    #[test]
    fn test_invocation_error_display() {
        let err = InvocationError::new(
            ErrorCode::MissingArgument,
            "bind",
            "missing required positional argument 'arg_0'",
        );
        assert_eq!(
            err.to_string(),
            "[missing_argument] (stage: bind): missing required positional argument 'arg_0'"
        );
    }

    #[test]
    fn test_invocation_error_json_roundtrip() {
        let err = InvocationError::new(ErrorCode::Unorderable, "rank", "NaN has no order")
            .with_hint("Filter out NaN values first");

        let json = serde_json::to_string(&err).unwrap();
        let back: InvocationError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
