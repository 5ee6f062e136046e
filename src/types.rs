//! Core value types exchanged between the caller, the pipeline and the stages.

use serde::{Deserialize, Serialize};

/// Dynamic argument value. Extra arguments and parameter defaults are JSON
/// values so stages with unrelated parameter shapes can share one pipeline.
pub type Value = serde_json::Value;

/// Keyword arguments by name, in insertion order of the JSON map.
pub type KeywordMap = serde_json::Map<String, Value>;

/// Error type returned by user stage functions.
///
/// The pipeline hands a stage's error back to its caller as the same box, so
/// callers can `downcast_ref` to their own error type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ─── Caller side ────────────────────────────────────────────────────────────

/// Extra arguments supplied by the caller of a pipeline, on top of the
/// elements themselves.
///
/// ```
/// use rapid_controller::CallArgs;
///
/// let args = CallArgs::new().arg(3).kwarg("limit", 10);
/// assert_eq!(args.positional.len(), 1);
/// assert_eq!(args.keywords["limit"], 10);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallArgs {
    /// Extra positional arguments, in order.
    #[serde(default)]
    pub positional: Vec<Value>,

    /// Extra keyword arguments.
    #[serde(default)]
    pub keywords: KeywordMap,
}

impl CallArgs {
    /// Empty argument set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyword argument, replacing any earlier value for `name`.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }
}

// ─── Stage side ─────────────────────────────────────────────────────────────

/// The arguments one stage receives after binding, beyond its role-reserved
/// parameters (the candidate, or the compared pair).
///
/// `args()` holds exactly as many values as the stage declared extra
/// positional parameters; `kwargs()` holds each keyword parameter the stage
/// declared. The capture payloads are only populated for stages that declare
/// the corresponding `*args` / `**kwargs` capture.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageArgs {
    positional: Vec<Value>,
    keywords: KeywordMap,
    varargs: Vec<Value>,
    varkw: KeywordMap,
}

impl StageArgs {
    pub(crate) fn new(
        positional: Vec<Value>,
        keywords: KeywordMap,
        varargs: Vec<Value>,
        varkw: KeywordMap,
    ) -> Self {
        Self {
            positional,
            keywords,
            varargs,
            varkw,
        }
    }

    /// Extra positional argument `index`, counting from the first parameter
    /// after the role-reserved ones.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn args(&self) -> &[Value] {
        &self.positional
    }

    /// Keyword parameter `name`.
    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.keywords.get(name)
    }

    pub fn kwargs(&self) -> &KeywordMap {
        &self.keywords
    }

    /// Surplus positional arguments captured by `*args`.
    pub fn varargs(&self) -> &[Value] {
        &self.varargs
    }

    /// Unrecognized keyword arguments captured by `**kwargs`.
    pub fn varkw(&self) -> &KeywordMap {
        &self.varkw
    }

    /// `true` when the stage receives nothing beyond its reserved parameters.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
            && self.keywords.is_empty()
            && self.varargs.is_empty()
            && self.varkw.is_empty()
    }
}
