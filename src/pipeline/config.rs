//! Declaration-time pipeline configuration.
//!
//! A [`PipelineConfig`] carries the built-in ranking switches and the
//! strictness setting. It is applied once by the builder and never looked at
//! again.
//!
//! # JSON shape
//!
//! ```json
//! { "sort": true, "sort_reverse": false, "strict": false }
//! ```
//!
//! Every field is optional; omitted flags are off.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Built-in ranking flags plus strictness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Rank survivors by their natural order.
    #[serde(default)]
    pub sort: bool,

    /// Flip whichever ranking is active.
    #[serde(default)]
    pub sort_reverse: bool,

    /// If `true`, unrecognized fields are errors; if `false`, warnings.
    #[serde(default)]
    pub strict: bool,

    /// Captures any fields not recognized by the schema.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from JSON text.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn with_sort(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_sort_reverse(mut self, reverse: bool) -> Self {
        self.sort_reverse = reverse;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Field names the schema did not recognize, sorted.
    pub fn unknown_field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.unknown_fields.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        let cfg = PipelineConfig::from_json("{}").unwrap();
        assert_eq!(cfg, PipelineConfig::default());
        assert!(!cfg.sort && !cfg.sort_reverse && !cfg.strict);
    }

    #[test]
    fn test_parse_flags() {
        let cfg = PipelineConfig::from_json(r#"{"sort": true, "sort_reverse": true}"#).unwrap();
        assert!(cfg.sort);
        assert!(cfg.sort_reverse);
        assert!(cfg.unknown_fields.is_empty());
    }

    #[test]
    fn test_unknown_fields_captured() {
        let cfg = PipelineConfig::from_json(r#"{"sortt": true, "limit": 3, "strict": true}"#).unwrap();
        assert!(cfg.strict);
        assert_eq!(cfg.unknown_field_names(), ["limit", "sortt"]);
    }

    #[test]
    fn test_wrong_type_is_serialization_error() {
        let err = PipelineConfig::from_json(r#"{"sort": "yes"}"#).unwrap_err();
        assert!(matches!(err, crate::ControllerError::Serialization { .. }));
    }

    #[test]
    fn test_builder_methods_roundtrip() {
        let cfg = PipelineConfig::new().with_sort(true).with_strict(true);
        let back = PipelineConfig::from_json(&cfg.to_json().unwrap()).unwrap();
        assert_eq!(back, cfg);
    }
}
