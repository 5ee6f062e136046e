//! Stable error codes shared by declaration-time and invocation-time errors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine-readable classification of every error and warning the crate
/// produces.
///
/// Codes serialize as `snake_case` strings and are stable across releases,
/// so callers can match on them instead of parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // ─── Declaration time ───────────────────────────────────────────────
    /// A stage's parameter list could not be determined or is malformed.
    InspectionFailed,
    /// A stage's parameter list violates an ordering rule.
    InvalidSignature,
    /// Two ranking sources were declared that cannot be combined.
    ConflictingRanking,
    /// `sort_reverse` was set without anything to reverse.
    OrphanReverse,
    /// A callable lacks the parameter its role passes first.
    MissingReceiverParam,
    /// A stage forwards a keyword the merged signature does not expose.
    SignatureMismatch,
    /// No stage and no ranking shortcut was declared.
    NoStages,
    /// A later stage's keyword default is hidden by an earlier stage's.
    KeywordDefaultShadowed,
    /// A `sort_key` is present but an explicit preference outranks it.
    ShadowedSortKey,
    /// Unrecognized configuration field.
    UnknownField,

    // ─── Invocation time ────────────────────────────────────────────────
    /// A required positional or keyword argument was not supplied.
    MissingArgument,
    /// More positional arguments than the pipeline accepts.
    UnexpectedArgument,
    /// A keyword argument the pipeline does not accept.
    UnexpectedKeyword,
    /// Two elements (or keys) have no natural ordering between them.
    Unorderable,
}

impl ErrorCode {
    /// Returns the `snake_case` name used in JSON and display output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InspectionFailed => "inspection_failed",
            Self::InvalidSignature => "invalid_signature",
            Self::ConflictingRanking => "conflicting_ranking",
            Self::OrphanReverse => "orphan_reverse",
            Self::MissingReceiverParam => "missing_receiver_param",
            Self::SignatureMismatch => "signature_mismatch",
            Self::NoStages => "no_stages",
            Self::KeywordDefaultShadowed => "keyword_default_shadowed",
            Self::ShadowedSortKey => "shadowed_sort_key",
            Self::UnknownField => "unknown_field",
            Self::MissingArgument => "missing_argument",
            Self::UnexpectedArgument => "unexpected_argument",
            Self::UnexpectedKeyword => "unexpected_keyword",
            Self::Unorderable => "unorderable",
        }
    }

    /// `true` for codes raised while a pipeline is being declared.
    pub fn is_declaration_time(&self) -> bool {
        !matches!(
            self,
            Self::MissingArgument
                | Self::UnexpectedArgument
                | Self::UnexpectedKeyword
                | Self::Unorderable
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
