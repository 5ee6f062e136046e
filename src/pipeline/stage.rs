//! Stage roles and their invocation plans.
//!
//! A pipeline has at most one stage per [`StageRole`]. Each role reserves a
//! fixed number of leading parameters that the pipeline fills itself (the
//! candidate, or the compared pair); everything after those is an *extra*
//! parameter the caller supplies through the pipeline.
//!
//! [`StageShape`] pairs a role with an inspected [`StageSignature`] and knows
//! how many extras the stage takes and which merged arguments it receives.

use std::cmp::Ordering;

use serde::Serialize;

use super::binding::BoundCall;
use super::error_code::ErrorCode;
use super::errors::DeclarationError;
use super::merge::MergedSignature;
use super::signature::StageSignature;
use crate::types::{BoxError, StageArgs, Value};

/// Name of the candidate parameter filled by the pipeline.
pub const CHOSEN_NAME: &str = "chosen";
/// Names of the compared pair filled by the pipeline.
pub const PAIR_NAMES: [&str; 2] = ["a", "b"];
/// Prefix of the merged positional slots (`arg_0`, `arg_1`, ...).
pub const POSITIONAL_ARG_PREFIX: &str = "arg_";
/// Name of the merged positional capture.
pub const VAR_ARG_NAME: &str = "args";
/// Name of the merged keyword capture.
pub const KWARG_NAME: &str = "kwargs";

/// Name of merged positional slot `index`.
pub fn positional_slot_name(index: usize) -> String {
    format!("{POSITIONAL_ARG_PREFIX}{index}")
}

// ─── Roles ──────────────────────────────────────────────────────────────────

/// The fixed roles a stage can play. Declaration order of this enum is the
/// merge priority: earlier roles win keyword-default collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRole {
    /// Transform applied to each ranked element.
    Action,
    /// Predicate deciding which elements survive.
    Filter,
    /// Pairwise comparator ranking the survivors.
    Preference,
    /// Key function ranking the survivors (the `sort_key` shortcut).
    SortKey,
}

impl StageRole {
    /// All roles, in merge priority order.
    pub const ALL: [StageRole; 4] = [Self::Action, Self::Filter, Self::Preference, Self::SortKey];

    /// Leading parameters this role fills itself.
    pub fn reserved_count(&self) -> usize {
        match self {
            Self::Action | Self::Filter | Self::SortKey => 1,
            Self::Preference => 2,
        }
    }

    /// Names given to the reserved parameters in invocation plans.
    pub fn reserved_names(&self) -> &'static [&'static str] {
        match self {
            Self::Action | Self::Filter | Self::SortKey => &[CHOSEN_NAME],
            Self::Preference => &PAIR_NAMES,
        }
    }

    /// The user-facing name used in paths and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Filter => "filter",
            Self::Preference => "preference",
            Self::SortKey => "sort_key",
        }
    }

    /// JSON pointer of this role in a declaration.
    pub fn path(&self) -> String {
        format!("/{}", self.as_str())
    }
}

// ─── Shapes ─────────────────────────────────────────────────────────────────

/// A role together with the inspected signature of the stage playing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageShape {
    role: StageRole,
    signature: StageSignature,
}

impl StageShape {
    pub fn new(role: StageRole, signature: StageSignature) -> Self {
        Self { role, signature }
    }

    pub fn role(&self) -> StageRole {
        self.role
    }

    pub fn signature(&self) -> &StageSignature {
        &self.signature
    }

    /// Extra positional parameters beyond the reserved ones, floored at 0.
    pub fn extra_param_count(&self) -> usize {
        self.signature
            .positional_count()
            .saturating_sub(self.role.reserved_count())
    }

    /// How many of the extras have no default.
    pub fn required_extra_count(&self) -> usize {
        self.signature
            .required_positional_count()
            .saturating_sub(self.role.reserved_count())
    }

    /// Default of each extra positional parameter (`None` = required), in
    /// slot order.
    pub fn extra_defaults(&self) -> impl Iterator<Item = Option<&Value>> {
        let required = self
            .signature
            .required_positional()
            .iter()
            .map(|_| None);
        let optional = self
            .signature
            .optional_positional()
            .iter()
            .map(|(_, default)| Some(default));
        required.chain(optional).skip(self.role.reserved_count())
    }

    /// Describe exactly which merged arguments this stage receives.
    ///
    /// Positional extras are truncated to the stage's own count; keywords are
    /// forwarded by name and must exist in `merged`. Fails with
    /// [`ErrorCode::SignatureMismatch`] otherwise.
    pub fn build_invocation_args(
        &self,
        merged: &MergedSignature,
    ) -> Result<InvocationPlan, DeclarationError> {
        let extra = self.extra_param_count();
        if extra > merged.extra_positional_count() {
            return Err(self.mismatch(format!(
                "takes {extra} extra positional arguments but the pipeline exposes {}",
                merged.extra_positional_count()
            )));
        }

        let mut positional_arg_names: Vec<String> = self
            .role
            .reserved_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        positional_arg_names.extend((0..extra).map(positional_slot_name));

        let mut keyword_arg_names = Vec::with_capacity(self.signature.keyword_params().len());
        for param in self.signature.keyword_params() {
            if merged.keyword(&param.name).is_none() {
                return Err(self.mismatch(format!(
                    "keyword '{}' is not part of the pipeline signature",
                    param.name
                )));
            }
            keyword_arg_names.push(param.name.clone());
        }

        let forwards_positional_capture = self.signature.has_positional_capture();
        let forwards_keyword_capture = self.signature.has_keyword_capture();
        if (forwards_positional_capture && !merged.has_positional_capture())
            || (forwards_keyword_capture && !merged.has_keyword_capture())
        {
            return Err(self.mismatch("declares a capture the pipeline does not expose"));
        }

        Ok(InvocationPlan {
            role: self.role,
            positional_arg_names,
            keyword_arg_names,
            forwards_positional_capture,
            forwards_keyword_capture,
        })
    }

    fn mismatch(&self, message: impl std::fmt::Display) -> DeclarationError {
        DeclarationError::new(
            ErrorCode::SignatureMismatch,
            self.role.path(),
            format!("'{}' {message}", self.signature.name()),
        )
    }
}

// ─── Invocation plans ───────────────────────────────────────────────────────

/// Which of the pipeline's arguments one stage is called with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationPlan {
    pub role: StageRole,
    /// Reserved names first (`chosen`, or `a`, `b`), then `arg_i` slots.
    pub positional_arg_names: Vec<String>,
    pub keyword_arg_names: Vec<String>,
    pub forwards_positional_capture: bool,
    pub forwards_keyword_capture: bool,
}

impl InvocationPlan {
    /// Number of merged positional slots forwarded.
    pub fn extra_positional_count(&self) -> usize {
        self.positional_arg_names.len() - self.role.reserved_count()
    }

    /// `true` when the stage is called with its reserved parameters only.
    pub fn is_reserved_only(&self) -> bool {
        self.extra_positional_count() == 0
            && self.keyword_arg_names.is_empty()
            && !self.forwards_positional_capture
            && !self.forwards_keyword_capture
    }

    /// Select this stage's arguments out of a bound call.
    pub(crate) fn bind(&self, call: &BoundCall) -> StageArgs {
        if self.is_reserved_only() {
            return StageArgs::default();
        }
        let positional = call.positional[..self.extra_positional_count()].to_vec();
        let keywords = self
            .keyword_arg_names
            .iter()
            .filter_map(|name| {
                call.keywords
                    .get(name)
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect();
        let varargs = if self.forwards_positional_capture {
            call.varargs.clone()
        } else {
            Vec::new()
        };
        let varkw = if self.forwards_keyword_capture {
            call.varkw.clone()
        } else {
            Default::default()
        };
        StageArgs::new(positional, keywords, varargs, varkw)
    }
}


// ─── Stage callables ────────────────────────────────────────────────────────

/// Filter stage: keep `chosen` when it returns `true`.
pub type FilterFn<S, T> = dyn Fn(&S, &T, &StageArgs) -> Result<bool, BoxError> + Send + Sync;

/// Preference stage: `Less` puts `a` before `b`.
pub type PreferenceFn<S, T> =
    dyn Fn(&S, &T, &T, &StageArgs) -> Result<Ordering, BoxError> + Send + Sync;

/// Action stage: transform one ranked element.
pub type ActionFn<S, T, U> = dyn Fn(&S, T, &StageArgs) -> Result<U, BoxError> + Send + Sync;

/// Natural element order used by the `sort` shortcut.
pub type NaturalOrderFn<T> = dyn Fn(&T, &T) -> Result<Ordering, BoxError> + Send + Sync;

/// A `sort_key` stage with its key type erased: returns the stable order of
/// `items` (indices), reversed when asked.
pub type KeyOrderFn<S, T> =
    dyn Fn(&S, &[T], &StageArgs, bool) -> Result<Vec<usize>, BoxError> + Send + Sync;
