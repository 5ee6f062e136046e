//! Signature merger: one call shape for the whole pipeline.
//!
//! Given the shapes of whichever stages are present, in role priority order
//! (action, filter, preference, sort_key), the merged signature is:
//!
//! - positional slots: as many as the stage needing the most extras; a slot
//!   is required if any stage requires it, otherwise it takes the default of
//!   the first stage declaring it;
//! - keywords: union by name, first occurrence wins the default;
//! - captures: OR of the stages' `*args` / `**kwargs` captures.
//!
//! A keyword reused with a different default is not an error; the first
//! stage's default silently applies to every stage.

use std::fmt;

use rustc_hash::FxHashSet;
use serde::Serialize;

use super::signature::KeywordParam;
use super::stage::{positional_slot_name, StageRole, StageShape, KWARG_NAME, VAR_ARG_NAME};
use crate::types::Value;

/// The pipeline's externally visible call shape (beyond `elements`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedSignature {
    extra_positional_count: usize,
    required_positional_count: usize,
    /// Default per optional slot; `None` for required slots.
    positional_defaults: Vec<Option<Value>>,
    keyword_params: Vec<KeywordParam>,
    has_positional_capture: bool,
    has_keyword_capture: bool,
}

impl MergedSignature {
    pub fn extra_positional_count(&self) -> usize {
        self.extra_positional_count
    }

    /// Leading slots the caller must always supply.
    pub fn required_positional_count(&self) -> usize {
        self.required_positional_count
    }

    /// Default of slot `index`, if the slot is optional.
    pub fn positional_default(&self, index: usize) -> Option<&Value> {
        self.positional_defaults.get(index).and_then(Option::as_ref)
    }

    pub fn keyword_params(&self) -> &[KeywordParam] {
        &self.keyword_params
    }

    /// Look up a merged keyword parameter by name.
    pub fn keyword(&self, name: &str) -> Option<&KeywordParam> {
        self.keyword_params.iter().find(|k| k.name == name)
    }

    pub fn has_positional_capture(&self) -> bool {
        self.has_positional_capture
    }

    pub fn has_keyword_capture(&self) -> bool {
        self.has_keyword_capture
    }

    /// `true` when the pipeline takes nothing but `elements`.
    pub fn is_empty(&self) -> bool {
        self.extra_positional_count == 0
            && self.keyword_params.is_empty()
            && !self.has_positional_capture
            && !self.has_keyword_capture
    }

    /// Human-readable call shape, e.g.
    /// `(elements, arg_0, arg_1=5, *args, k=1, **kwargs)`.
    pub fn render(&self) -> String {
        let mut parts = vec!["elements".to_string()];
        for index in 0..self.extra_positional_count {
            let name = positional_slot_name(index);
            match self.positional_default(index) {
                Some(default) => parts.push(format!("{name}={default}")),
                None => parts.push(name),
            }
        }
        if self.has_positional_capture {
            parts.push(format!("*{VAR_ARG_NAME}"));
        } else if !self.keyword_params.is_empty() {
            parts.push("*".to_string());
        }
        for param in &self.keyword_params {
            match &param.default {
                Some(default) => parts.push(format!("{}={default}", param.name)),
                None => parts.push(param.name.clone()),
            }
        }
        if self.has_keyword_capture {
            parts.push(format!("**{KWARG_NAME}"));
        }
        format!("({})", parts.join(", "))
    }
}

impl fmt::Display for MergedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Merge stage shapes into one signature.
///
/// `shapes` must be in role priority order; [`StageRole`]'s ordering is the
/// canonical one.
pub fn merge(shapes: &[&StageShape]) -> MergedSignature {
    let extra_positional_count = shapes
        .iter()
        .map(|s| s.extra_param_count())
        .max()
        .unwrap_or(0);
    let required_positional_count = shapes
        .iter()
        .map(|s| s.required_extra_count())
        .max()
        .unwrap_or(0);

    let mut positional_defaults: Vec<Option<Value>> = vec![None; extra_positional_count];
    for shape in shapes {
        for (index, default) in shape.extra_defaults().enumerate() {
            if index < required_positional_count {
                continue;
            }
            if positional_defaults[index].is_none() {
                positional_defaults[index] = default.cloned();
            }
        }
    }

    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut keyword_params = Vec::new();
    for shape in shapes {
        for param in shape.signature().keyword_params() {
            if seen.insert(param.name.as_str()) {
                keyword_params.push(param.clone());
            }
        }
    }

    MergedSignature {
        extra_positional_count,
        required_positional_count,
        positional_defaults,
        keyword_params,
        has_positional_capture: shapes.iter().any(|s| s.signature().has_positional_capture()),
        has_keyword_capture: shapes.iter().any(|s| s.signature().has_keyword_capture()),
    }
}

/// A keyword or optional positional slot given different defaults by two
/// stages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefaultCollision {
    /// Keyword name, or the merged slot name (`arg_1`).
    pub name: String,
    /// Role whose default the merged signature keeps.
    pub winner: StageRole,
    /// Role whose default is ignored.
    pub shadowed: StageRole,
}

/// List every default in a later stage that an earlier stage's default
/// hides. Slots some stage requires are skipped: the caller always supplies
/// them, so no default is used.
pub fn default_collisions(shapes: &[&StageShape]) -> Vec<DefaultCollision> {
    let required = shapes
        .iter()
        .map(|s| s.required_extra_count())
        .max()
        .unwrap_or(0);
    let mut out = Vec::new();

    let mut first_slot: Vec<Option<(&Value, StageRole)>> = Vec::new();
    for shape in shapes {
        for (index, default) in shape.extra_defaults().enumerate() {
            let Some(default) = default else { continue };
            if index < required {
                continue;
            }
            if first_slot.len() <= index {
                first_slot.resize(index + 1, None);
            }
            match first_slot[index] {
                Some((winner, role)) if winner != default => out.push(DefaultCollision {
                    name: positional_slot_name(index),
                    winner: role,
                    shadowed: shape.role(),
                }),
                Some(_) => {}
                None => first_slot[index] = Some((default, shape.role())),
            }
        }
    }

    let mut first_keyword: Vec<(&KeywordParam, StageRole)> = Vec::new();
    for shape in shapes {
        for param in shape.signature().keyword_params() {
            match first_keyword.iter().find(|(p, _)| p.name == param.name) {
                Some((winner, role)) if winner.default != param.default => {
                    out.push(DefaultCollision {
                        name: param.name.clone(),
                        winner: *role,
                        shadowed: shape.role(),
                    });
                }
                Some(_) => {}
                None => first_keyword.push((param, shape.role())),
            }
        }
    }
    out
}
