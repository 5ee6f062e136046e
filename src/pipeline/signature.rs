//! Stage parameter lists and the signature inspector.
//!
//! Stages are plain closures, so their parameter shape cannot be reflected at
//! runtime. Instead the declarer describes it with a [`ParamList`], written in
//! declaration order exactly as the callable's parameters would read:
//!
//! ```
//! use rapid_controller::pipeline::signature::{inspect, ParamList};
//! use serde_json::json;
//!
//! // fn sort_key(self, chosen, offset, scale = 1, *, verbose = false)
//! let params = ParamList::method("sort_key")
//!     .positional("chosen")
//!     .positional("offset")
//!     .positional_default("scale", json!(1))
//!     .keyword("verbose", json!(false));
//!
//! let sig = inspect(&params, "/sort_key").unwrap();
//! assert_eq!(sig.required_positional_count(), 2);
//! assert_eq!(sig.optional_positional().len(), 1);
//! assert_eq!(sig.keyword_params().len(), 1);
//! ```
//!
//! [`inspect`] checks the list is well formed and produces the immutable
//! [`StageSignature`] the rest of the pipeline works from.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::error_code::ErrorCode;
use super::errors::DeclarationError;
use crate::types::Value;

/// Name given to the receiver of [`ParamList::method`] lists.
pub const DEFAULT_RECEIVER_NAME: &str = "self";

// ─── Declared parameter lists ───────────────────────────────────────────────

/// How a parameter can be supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Positional (or positional-or-keyword) parameter.
    Positional,
    /// `*args`-style capture of surplus positional arguments.
    VarPositional,
    /// Parameter that can only be passed by name.
    KeywordOnly,
    /// `**kwargs`-style capture of unrecognized keyword arguments.
    VarKeyword,
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Whether the callable is bound to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Receiver {
    /// Instance method; the first declared parameter is the receiver.
    Instance(String),
    /// Static-style callable; every parameter is a real parameter.
    Static,
}

/// Declared parameter list of one stage callable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamList {
    name: String,
    receiver: Receiver,
    params: Vec<Param>,
    #[serde(default)]
    opaque: bool,
}

impl ParamList {
    /// Instance method whose receiver is named `self`.
    pub fn method(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            receiver: Receiver::Instance(DEFAULT_RECEIVER_NAME.to_string()),
            params: Vec::new(),
            opaque: false,
        }
    }

    /// Static-style callable with no receiver.
    pub fn function(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            receiver: Receiver::Static,
            params: Vec::new(),
            opaque: false,
        }
    }

    /// A callable whose parameters cannot be determined (e.g. a native
    /// builtin). Inspecting it always fails.
    pub fn opaque(name: impl Into<String>) -> Self {
        Self {
            opaque: true,
            ..Self::function(name)
        }
    }

    /// Rename the receiver of an instance method.
    pub fn with_receiver(mut self, name: impl Into<String>) -> Self {
        self.receiver = Receiver::Instance(name.into());
        self
    }

    /// Required positional parameter.
    pub fn positional(self, name: impl Into<String>) -> Self {
        self.push(name, ParamKind::Positional, None)
    }

    /// Positional parameter with a default.
    pub fn positional_default(self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.push(name, ParamKind::Positional, Some(default.into()))
    }

    /// `*name` capture.
    pub fn var_positional(self, name: impl Into<String>) -> Self {
        self.push(name, ParamKind::VarPositional, None)
    }

    /// Keyword-only parameter with a default.
    pub fn keyword(self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.push(name, ParamKind::KeywordOnly, Some(default.into()))
    }

    /// Keyword-only parameter the caller must supply.
    pub fn keyword_required(self, name: impl Into<String>) -> Self {
        self.push(name, ParamKind::KeywordOnly, None)
    }

    /// `**name` capture.
    pub fn var_keyword(self, name: impl Into<String>) -> Self {
        self.push(name, ParamKind::VarKeyword, None)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn receiver(&self) -> &Receiver {
        &self.receiver
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    fn push(mut self, name: impl Into<String>, kind: ParamKind, default: Option<Value>) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind,
            default,
        });
        self
    }
}

// ─── Inspected signature ────────────────────────────────────────────────────

/// A keyword parameter and its default (`None` = must be supplied).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordParam {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Immutable description of one stage's parameter shape, receiver stripped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSignature {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    receiver: Option<String>,
    required_positional: Vec<String>,
    optional_positional: Vec<(String, Value)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    positional_capture: Option<String>,
    keyword_params: Vec<KeywordParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keyword_capture: Option<String>,
}

impl StageSignature {
    /// Name of the inspected callable.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Receiver name for instance methods, `None` for static callables.
    pub fn receiver(&self) -> Option<&str> {
        self.receiver.as_deref()
    }

    pub fn required_positional(&self) -> &[String] {
        &self.required_positional
    }

    pub fn required_positional_count(&self) -> usize {
        self.required_positional.len()
    }

    /// Defaulted positional parameters, in declaration order.
    pub fn optional_positional(&self) -> &[(String, Value)] {
        &self.optional_positional
    }

    /// Required plus optional positional parameters.
    pub fn positional_count(&self) -> usize {
        self.required_positional.len() + self.optional_positional.len()
    }

    /// Positional parameter names in declaration order.
    pub fn positional_names(&self) -> impl Iterator<Item = &str> {
        self.required_positional
            .iter()
            .map(String::as_str)
            .chain(self.optional_positional.iter().map(|(n, _)| n.as_str()))
    }

    pub fn positional_capture(&self) -> Option<&str> {
        self.positional_capture.as_deref()
    }

    pub fn has_positional_capture(&self) -> bool {
        self.positional_capture.is_some()
    }

    pub fn keyword_params(&self) -> &[KeywordParam] {
        &self.keyword_params
    }

    pub fn keyword_capture(&self) -> Option<&str> {
        self.keyword_capture.as_deref()
    }

    pub fn has_keyword_capture(&self) -> bool {
        self.keyword_capture.is_some()
    }
}

// ─── Inspector ──────────────────────────────────────────────────────────────

/// Where the inspector is in the parameter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Section {
    Positional,
    KeywordOnly,
    Closed,
}

/// Inspect a declared parameter list.
///
/// `path` locates the stage in the declaration (e.g. `"/filter"`) and is
/// carried by any error. Fails with [`ErrorCode::InspectionFailed`] when the
/// list is opaque or lacks its receiver, and [`ErrorCode::InvalidSignature`]
/// when the parameters are not in a legal order.
pub fn inspect(list: &ParamList, path: &str) -> Result<StageSignature, DeclarationError> {
    if list.opaque {
        return Err(DeclarationError::new(
            ErrorCode::InspectionFailed,
            path,
            format!("cannot determine the parameters of '{}'", list.name),
        )
        .with_hint("Declare the parameter list explicitly instead of ParamList::opaque"));
    }

    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let receiver = match &list.receiver {
        Receiver::Instance(name) if name.is_empty() => {
            return Err(DeclarationError::new(
                ErrorCode::InspectionFailed,
                path,
                format!("instance method '{}' has no receiver parameter", list.name),
            )
            .with_hint("Use ParamList::function for callables without a receiver"));
        }
        Receiver::Instance(name) => {
            seen.insert(name);
            Some(name.clone())
        }
        Receiver::Static => None,
    };

    let invalid = |message: String| {
        DeclarationError::new(ErrorCode::InvalidSignature, path, message)
    };

    let mut sig = StageSignature {
        name: list.name.clone(),
        receiver,
        required_positional: Vec::new(),
        optional_positional: Vec::new(),
        positional_capture: None,
        keyword_params: Vec::new(),
        keyword_capture: None,
    };
    let mut section = Section::Positional;

    for param in &list.params {
        if param.name.is_empty() {
            return Err(invalid(format!("'{}' declares a parameter with no name", list.name)));
        }
        if !seen.insert(&param.name) {
            return Err(invalid(format!(
                "duplicate parameter '{}' in '{}'",
                param.name, list.name
            )));
        }
        if section == Section::Closed {
            return Err(invalid(format!(
                "parameter '{}' follows the keyword capture of '{}'",
                param.name, list.name
            )));
        }

        match param.kind {
            ParamKind::Positional => {
                if section != Section::Positional {
                    return Err(invalid(format!(
                        "positional parameter '{}' follows a capture or keyword-only parameter",
                        param.name
                    )));
                }
                match &param.default {
                    Some(default) => sig
                        .optional_positional
                        .push((param.name.clone(), default.clone())),
                    None if !sig.optional_positional.is_empty() => {
                        return Err(invalid(format!(
                            "non-default parameter '{}' follows a default parameter",
                            param.name
                        )));
                    }
                    None => sig.required_positional.push(param.name.clone()),
                }
            }
            ParamKind::VarPositional => {
                if sig.positional_capture.is_some() || section != Section::Positional {
                    return Err(invalid(format!(
                        "'{}' declares a second or misplaced positional capture '{}'",
                        list.name, param.name
                    )));
                }
                sig.positional_capture = Some(param.name.clone());
                section = Section::KeywordOnly;
            }
            ParamKind::KeywordOnly => {
                sig.keyword_params.push(KeywordParam {
                    name: param.name.clone(),
                    default: param.default.clone(),
                });
                section = Section::KeywordOnly;
            }
            ParamKind::VarKeyword => {
                sig.keyword_capture = Some(param.name.clone());
                section = Section::Closed;
            }
        }
    }

    Ok(sig)
}
