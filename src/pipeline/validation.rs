//! Validation engine for pipeline declarations.
//!
//! The engine runs all registered [`ValidationRule`]s against a
//! [`Declaration`] and collects every diagnostic into a [`ValidationReport`].
//! It never short-circuits on the first error, so users see all problems at
//! once. [`PipelineBuilder::build`](super::builder::PipelineBuilder::build)
//! fails with the first error and logs the warnings.
//!
//! # Quick start
//!
//! ```rust
//! use rapid_controller::pipeline::config::PipelineConfig;
//! use rapid_controller::pipeline::validation::{Declaration, ValidationEngine};
//!
//! let decl = Declaration::new(PipelineConfig::new().with_sort_reverse(true));
//! let report = ValidationEngine::with_defaults().validate(&decl);
//! assert!(report.has_errors());
//! for err in report.errors() {
//!     eprintln!("{err}");
//! }
//! ```

use serde::Serialize;

use super::config::PipelineConfig;
use super::error_code::ErrorCode;
use super::errors::DeclarationError;
use super::merge::default_collisions;
use super::ranking::RankingSources;
use super::stage::{StageRole, StageShape};

// ─── Declaration ────────────────────────────────────────────────────────────

/// Everything known about a pipeline before it is built: the config and the
/// inspected shape of each declared stage.
#[derive(Debug, Clone, Default)]
pub struct Declaration {
    pub config: PipelineConfig,
    pub action: Option<StageShape>,
    pub filter: Option<StageShape>,
    pub preference: Option<StageShape>,
    pub sort_key: Option<StageShape>,
}

impl Declaration {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Store `shape` under its role, replacing any previous one.
    pub fn set_shape(&mut self, shape: StageShape) {
        let slot = match shape.role() {
            StageRole::Action => &mut self.action,
            StageRole::Filter => &mut self.filter,
            StageRole::Preference => &mut self.preference,
            StageRole::SortKey => &mut self.sort_key,
        };
        *slot = Some(shape);
    }

    pub fn with_shape(mut self, shape: StageShape) -> Self {
        self.set_shape(shape);
        self
    }

    pub fn shape(&self, role: StageRole) -> Option<&StageShape> {
        match role {
            StageRole::Action => self.action.as_ref(),
            StageRole::Filter => self.filter.as_ref(),
            StageRole::Preference => self.preference.as_ref(),
            StageRole::SortKey => self.sort_key.as_ref(),
        }
    }

    /// Present shapes in merge priority order.
    pub fn shapes(&self) -> Vec<&StageShape> {
        StageRole::ALL
            .iter()
            .filter_map(|role| self.shape(*role))
            .collect()
    }

    /// Present shapes that take part in the pipeline signature. A
    /// `sort_key` is left out when a preference stage shadows it.
    pub fn active_shapes(&self) -> Vec<&StageShape> {
        let shadowed = self.preference.is_some().then_some(StageRole::SortKey);
        self.shapes()
            .into_iter()
            .filter(|shape| Some(shape.role()) != shadowed)
            .collect()
    }

    pub fn ranking_sources(&self) -> RankingSources {
        RankingSources {
            sort: self.config.sort,
            sort_reverse: self.config.sort_reverse,
            preference: self.preference.is_some(),
            sort_key: self.sort_key.is_some(),
        }
    }
}

// ─── Severity ───────────────────────────────────────────────────────────────

/// Whether a diagnostic is a hard error or a soft warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

// ─── Diagnostic ─────────────────────────────────────────────────────────────

/// A single validation finding.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationDiagnostic {
    pub severity: Severity,
    #[serde(flatten)]
    pub error: DeclarationError,
}

impl ValidationDiagnostic {
    pub fn error(err: DeclarationError) -> Self {
        Self {
            severity: Severity::Error,
            error: err,
        }
    }

    pub fn warning(err: DeclarationError) -> Self {
        Self {
            severity: Severity::Warning,
            error: err,
        }
    }
}

// ─── Report ─────────────────────────────────────────────────────────────────

/// Collected diagnostics from running all validation rules.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub diagnostics: Vec<ValidationDiagnostic>,
}

impl ValidationReport {
    /// Iterate over error-severity diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &DeclarationError> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| &d.error)
    }

    /// Iterate over warning-severity diagnostics.
    pub fn warnings(&self) -> impl Iterator<Item = &DeclarationError> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .map(|d| &d.error)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Returns `true` if there are no errors (warnings are acceptable).
    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// The first error, if any, consuming the report.
    pub fn into_first_error(self) -> Option<DeclarationError> {
        self.diagnostics
            .into_iter()
            .find(|d| d.severity == Severity::Error)
            .map(|d| d.error)
    }
}

// ─── Rule trait ─────────────────────────────────────────────────────────────

/// A single validation rule that inspects a [`Declaration`] and returns
/// zero or more diagnostics.
///
/// Rules are stateless and must be `Send + Sync`.
pub trait ValidationRule: Send + Sync {
    /// Short, stable identifier for this rule (e.g., `"orphan_reverse"`).
    fn name(&self) -> &str;

    fn validate(&self, decl: &Declaration) -> Vec<ValidationDiagnostic>;
}

// ─── Engine ─────────────────────────────────────────────────────────────────

/// Runs a set of [`ValidationRule`]s against a [`Declaration`].
pub struct ValidationEngine {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl ValidationEngine {
    /// Create an empty engine with no rules.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Create an engine pre-loaded with the default rule set.
    pub fn with_defaults() -> Self {
        let mut engine = Self::new();
        engine.add_rule(Box::new(SortPreferenceRule));
        engine.add_rule(Box::new(SortKeyConflictRule));
        engine.add_rule(Box::new(OrphanReverseRule));
        engine.add_rule(Box::new(SortKeyReceiverRule));
        engine.add_rule(Box::new(ReservedParamsRule));
        engine.add_rule(Box::new(EmptyPipelineRule));
        engine.add_rule(Box::new(KeywordDefaultsRule));
        engine.add_rule(Box::new(ShadowedSortKeyRule));
        engine.add_rule(Box::new(UnknownFieldsRule));
        engine
    }

    /// Register an additional rule.
    pub fn add_rule(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Run all rules against `decl` and return the collected report.
    pub fn validate(&self, decl: &Declaration) -> ValidationReport {
        let mut report = ValidationReport::default();
        for rule in &self.rules {
            report.diagnostics.extend(rule.validate(decl));
        }
        report
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Concrete rules
// ═══════════════════════════════════════════════════════════════════════════

// ─── 1. sort excludes an explicit preference ────────────────────────────────

struct SortPreferenceRule;

impl ValidationRule for SortPreferenceRule {
    fn name(&self) -> &str {
        "sort_preference"
    }

    fn validate(&self, decl: &Declaration) -> Vec<ValidationDiagnostic> {
        if decl.config.sort && decl.preference.is_some() {
            vec![ValidationDiagnostic::error(
                DeclarationError::new(
                    ErrorCode::ConflictingRanking,
                    "/sort",
                    "sort cannot be combined with a preference stage",
                )
                .with_hint("Drop sort=true, or remove the preference stage"),
            )]
        } else {
            vec![]
        }
    }
}

// ─── 2. sort excludes sort_key ──────────────────────────────────────────────

struct SortKeyConflictRule;

impl ValidationRule for SortKeyConflictRule {
    fn name(&self) -> &str {
        "sort_key_conflict"
    }

    fn validate(&self, decl: &Declaration) -> Vec<ValidationDiagnostic> {
        if decl.config.sort && decl.sort_key.is_some() {
            vec![ValidationDiagnostic::error(
                DeclarationError::new(
                    ErrorCode::ConflictingRanking,
                    "/sort_key",
                    "sort cannot be combined with a sort_key",
                )
                .with_hint("A sort_key already implies sorting; drop sort=true"),
            )]
        } else {
            vec![]
        }
    }
}

// ─── 3. sort_reverse needs something to reverse ─────────────────────────────

struct OrphanReverseRule;

impl ValidationRule for OrphanReverseRule {
    fn name(&self) -> &str {
        "orphan_reverse"
    }

    fn validate(&self, decl: &Declaration) -> Vec<ValidationDiagnostic> {
        let has_ranking =
            decl.config.sort || decl.sort_key.is_some() || decl.preference.is_some();
        if decl.config.sort_reverse && !has_ranking {
            vec![ValidationDiagnostic::error(
                DeclarationError::new(
                    ErrorCode::OrphanReverse,
                    "/sort_reverse",
                    "sort_reverse is set but nothing ranks the elements",
                )
                .with_hint("Also set sort=true, a sort_key, or a preference stage"),
            )]
        } else {
            vec![]
        }
    }
}

// ─── 4. sort_key must take the candidate ────────────────────────────────────

struct SortKeyReceiverRule;

impl ValidationRule for SortKeyReceiverRule {
    fn name(&self) -> &str {
        "sort_key_receiver"
    }

    fn validate(&self, decl: &Declaration) -> Vec<ValidationDiagnostic> {
        let Some(shape) = &decl.sort_key else {
            return vec![];
        };
        let sig = shape.signature();
        if sig.positional_count() == 0 && !sig.has_positional_capture() {
            vec![ValidationDiagnostic::error(
                DeclarationError::new(
                    ErrorCode::MissingReceiverParam,
                    StageRole::SortKey.path(),
                    format!("sort_key '{}' takes no candidate parameter", sig.name()),
                )
                .with_hint("Declare the candidate as its first parameter"),
            )]
        } else {
            vec![]
        }
    }
}

// ─── 5. other stages short of their reserved parameters ─────────────────────

struct ReservedParamsRule;

impl ValidationRule for ReservedParamsRule {
    fn name(&self) -> &str {
        "reserved_params"
    }

    fn validate(&self, decl: &Declaration) -> Vec<ValidationDiagnostic> {
        [&decl.action, &decl.filter, &decl.preference]
            .into_iter()
            .flatten()
            .filter(|shape| {
                let sig = shape.signature();
                sig.positional_count() < shape.role().reserved_count()
                    && !sig.has_positional_capture()
            })
            .map(|shape| {
                let role = shape.role();
                ValidationDiagnostic::warning(DeclarationError::new(
                    ErrorCode::MissingReceiverParam,
                    role.path(),
                    format!(
                        "{} '{}' declares fewer than {} reserved parameters ({})",
                        role.as_str(),
                        shape.signature().name(),
                        role.reserved_count(),
                        role.reserved_names().join(", "),
                    ),
                ))
            })
            .collect()
    }
}

// ─── 6. empty pipeline ──────────────────────────────────────────────────────

struct EmptyPipelineRule;

impl ValidationRule for EmptyPipelineRule {
    fn name(&self) -> &str {
        "empty_pipeline"
    }

    fn validate(&self, decl: &Declaration) -> Vec<ValidationDiagnostic> {
        if decl.shapes().is_empty() && !decl.config.sort && !decl.config.sort_reverse {
            vec![ValidationDiagnostic::warning(
                DeclarationError::new(
                    ErrorCode::NoStages,
                    "/",
                    "no stages and no ranking; the pipeline returns its input unchanged",
                )
                .with_hint("Declare a filter, preference, sort_key or action"),
            )]
        } else {
            vec![]
        }
    }
}

// ─── 7. keyword and slot default collisions ─────────────────────────────────

struct KeywordDefaultsRule;

impl ValidationRule for KeywordDefaultsRule {
    fn name(&self) -> &str {
        "keyword_defaults"
    }

    fn validate(&self, decl: &Declaration) -> Vec<ValidationDiagnostic> {
        default_collisions(&decl.active_shapes())
            .into_iter()
            .map(|c| {
                ValidationDiagnostic::warning(
                    DeclarationError::new(
                        ErrorCode::KeywordDefaultShadowed,
                        format!("{}/{}", c.shadowed.path(), c.name),
                        format!(
                            "{} default of '{}' is ignored; the {} default wins",
                            c.shadowed.as_str(),
                            c.name,
                            c.winner.as_str()
                        ),
                    )
                    .with_hint("Give the parameter the same default in every stage"),
                )
            })
            .collect()
    }
}

// ─── 8. sort_key hidden by a preference ─────────────────────────────────────

struct ShadowedSortKeyRule;

impl ValidationRule for ShadowedSortKeyRule {
    fn name(&self) -> &str {
        "shadowed_sort_key"
    }

    fn validate(&self, decl: &Declaration) -> Vec<ValidationDiagnostic> {
        if decl.preference.is_some() && decl.sort_key.is_some() {
            vec![ValidationDiagnostic::warning(
                DeclarationError::new(
                    ErrorCode::ShadowedSortKey,
                    StageRole::SortKey.path(),
                    "the preference stage ranks the elements; sort_key is never called \
                     and its parameters are left out of the pipeline signature",
                )
                .with_hint("Remove one of the two"),
            )]
        } else {
            vec![]
        }
    }
}

// ─── 9. unknown config fields (strict mode) ─────────────────────────────────

struct UnknownFieldsRule;

impl ValidationRule for UnknownFieldsRule {
    fn name(&self) -> &str {
        "unknown_fields"
    }

    fn validate(&self, decl: &Declaration) -> Vec<ValidationDiagnostic> {
        decl.config
            .unknown_field_names()
            .into_iter()
            .map(|key| {
                let err = DeclarationError::new(
                    ErrorCode::UnknownField,
                    format!("/config/{key}"),
                    format!("unknown field '{key}'"),
                );
                if decl.config.strict {
                    ValidationDiagnostic::error(err)
                } else {
                    ValidationDiagnostic::warning(err)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::signature::{inspect, ParamList};

    fn shape(role: StageRole, list: ParamList) -> StageShape {
        StageShape::new(role, inspect(&list, &role.path()).unwrap())
    }

    fn unary(role: StageRole) -> StageShape {
        shape(role, ParamList::method(role.as_str()).positional("chosen"))
    }

    fn preference() -> StageShape {
        shape(
            StageRole::Preference,
            ParamList::method("preference").positional("a").positional("b"),
        )
    }

    fn codes(report: &ValidationReport, severity: Severity) -> Vec<ErrorCode> {
        report
            .diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .map(|d| d.error.code)
            .collect()
    }

    #[test]
    fn test_valid_declaration_is_clean() {
        let decl = Declaration::new(PipelineConfig::new().with_sort(true))
            .with_shape(unary(StageRole::Filter))
            .with_shape(unary(StageRole::Action));
        let report = ValidationEngine::with_defaults().validate(&decl);
        assert!(report.is_empty(), "{:?}", report.diagnostics);
    }

    #[test]
    fn test_sort_with_preference_is_error() {
        let decl = Declaration::new(PipelineConfig::new().with_sort(true)).with_shape(preference());
        let report = ValidationEngine::with_defaults().validate(&decl);
        assert_eq!(codes(&report, Severity::Error), [ErrorCode::ConflictingRanking]);
        assert_eq!(report.errors().next().unwrap().path, "/sort");
    }

    #[test]
    fn test_sort_with_sort_key_is_error() {
        let decl = Declaration::new(PipelineConfig::new().with_sort(true))
            .with_shape(unary(StageRole::SortKey));
        let report = ValidationEngine::with_defaults().validate(&decl);
        assert_eq!(codes(&report, Severity::Error), [ErrorCode::ConflictingRanking]);
        assert_eq!(report.errors().next().unwrap().path, "/sort_key");
    }

    #[test]
    fn test_reverse_alone_is_error() {
        let decl = Declaration::new(PipelineConfig::new().with_sort_reverse(true));
        let report = ValidationEngine::with_defaults().validate(&decl);
        assert_eq!(codes(&report, Severity::Error), [ErrorCode::OrphanReverse]);
        // An orphan reverse is not reported as an empty pipeline as well.
        assert!(codes(&report, Severity::Warning).is_empty());
    }

    #[test]
    fn test_reverse_with_each_source_is_valid() {
        let engine = ValidationEngine::with_defaults();
        let reverse = PipelineConfig::new().with_sort_reverse(true);
        assert!(engine.validate(&Declaration::new(reverse.clone().with_sort(true))).is_valid());
        assert!(engine
            .validate(&Declaration::new(reverse.clone()).with_shape(preference()))
            .is_valid());
        assert!(engine
            .validate(&Declaration::new(reverse).with_shape(unary(StageRole::SortKey)))
            .is_valid());
    }

    #[test]
    fn test_sort_key_without_params_is_error() {
        let decl = Declaration::default().with_shape(shape(StageRole::SortKey, ParamList::method("key")));
        let report = ValidationEngine::with_defaults().validate(&decl);
        assert_eq!(codes(&report, Severity::Error), [ErrorCode::MissingReceiverParam]);
    }

    #[test]
    fn test_sort_key_with_capture_only_is_valid() {
        let decl = Declaration::default()
            .with_shape(shape(StageRole::SortKey, ParamList::method("key").var_positional("args")));
        assert!(ValidationEngine::with_defaults().validate(&decl).is_valid());
    }

    #[test]
    fn test_short_preference_is_warning() {
        let decl = Declaration::default().with_shape(shape(
            StageRole::Preference,
            ParamList::method("preference").positional("a"),
        ));
        let report = ValidationEngine::with_defaults().validate(&decl);
        assert!(report.is_valid());
        assert_eq!(codes(&report, Severity::Warning), [ErrorCode::MissingReceiverParam]);
    }

    #[test]
    fn test_empty_pipeline_is_warning() {
        let report = ValidationEngine::with_defaults().validate(&Declaration::default());
        assert!(report.is_valid());
        assert_eq!(codes(&report, Severity::Warning), [ErrorCode::NoStages]);
    }

    #[test]
    fn test_keyword_collision_is_warning() {
        let action = shape(
            StageRole::Action,
            ParamList::method("action").positional("chosen").keyword("k", 1),
        );
        let filter = shape(
            StageRole::Filter,
            ParamList::method("filter").positional("chosen").keyword("k", 2),
        );
        let decl = Declaration::default().with_shape(filter).with_shape(action);
        let report = ValidationEngine::with_defaults().validate(&decl);
        let warning = report.warnings().next().unwrap();
        assert_eq!(warning.code, ErrorCode::KeywordDefaultShadowed);
        assert_eq!(warning.path, "/filter/k");
    }

    #[test]
    fn test_slot_default_collision_is_warning() {
        let action = shape(
            StageRole::Action,
            ParamList::method("action").positional("chosen").positional_default("scale", 5),
        );
        let filter = shape(
            StageRole::Filter,
            ParamList::method("filter").positional("chosen").positional_default("min", 0),
        );
        let decl = Declaration::default().with_shape(filter).with_shape(action);
        let report = ValidationEngine::with_defaults().validate(&decl);
        assert!(report.is_valid());
        let warning = report.warnings().next().unwrap();
        assert_eq!(warning.code, ErrorCode::KeywordDefaultShadowed);
        assert_eq!(warning.path, "/filter/arg_0");
    }

    #[test]
    fn test_shadowed_sort_key_is_not_active() {
        let key = shape(
            StageRole::SortKey,
            ParamList::method("key").positional("chosen").keyword("k", 2),
        );
        let pref = shape(
            StageRole::Preference,
            ParamList::method("preference")
                .positional("a")
                .positional("b")
                .keyword("k", 1),
        );
        let decl = Declaration::default().with_shape(pref).with_shape(key);
        let roles: Vec<_> = decl.active_shapes().iter().map(|s| s.role()).collect();
        assert_eq!(roles, [StageRole::Preference]);
        // The shadowed key's differing keyword default is not reported.
        let report = ValidationEngine::with_defaults().validate(&decl);
        assert_eq!(codes(&report, Severity::Warning), [ErrorCode::ShadowedSortKey]);
    }

    #[test]
    fn test_preference_shadows_sort_key() {
        let decl = Declaration::default()
            .with_shape(preference())
            .with_shape(unary(StageRole::SortKey));
        let report = ValidationEngine::with_defaults().validate(&decl);
        assert!(report.is_valid());
        assert_eq!(codes(&report, Severity::Warning), [ErrorCode::ShadowedSortKey]);
    }

    #[test]
    fn test_unknown_fields_follow_strictness() {
        let mut cfg = PipelineConfig::from_json(r#"{"sort": true, "srot": 1}"#).unwrap();
        let engine = ValidationEngine::with_defaults();
        let report = engine.validate(&Declaration::new(cfg.clone()));
        assert!(report.is_valid());
        assert_eq!(codes(&report, Severity::Warning), [ErrorCode::UnknownField]);

        cfg.strict = true;
        let report = engine.validate(&Declaration::new(cfg));
        let err = report.into_first_error().unwrap();
        assert_eq!(err.code, ErrorCode::UnknownField);
        assert_eq!(err.path, "/config/srot");
    }

    #[test]
    fn test_all_errors_collected() {
        let decl = Declaration::new(PipelineConfig::new().with_sort(true))
            .with_shape(preference())
            .with_shape(shape(StageRole::SortKey, ParamList::method("key")));
        let report = ValidationEngine::with_defaults().validate(&decl);
        assert_eq!(report.errors().count(), 3);
    }

    #[test]
    fn test_shapes_in_priority_order() {
        let decl = Declaration::default()
            .with_shape(unary(StageRole::SortKey))
            .with_shape(unary(StageRole::Action))
            .with_shape(unary(StageRole::Filter));
        let roles: Vec<_> = decl.shapes().iter().map(|s| s.role()).collect();
        assert_eq!(roles, [StageRole::Action, StageRole::Filter, StageRole::SortKey]);
    }

    #[test]
    fn test_default_rule_names() {
        let engine = ValidationEngine::default();
        assert_eq!(engine.rule_names().len(), 9);
        assert!(engine.rule_names().contains(&"orphan_reverse"));
    }

    #[test]
    fn test_report_serializes_flat() {
        let report = ValidationEngine::with_defaults().validate(&Declaration::default());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["diagnostics"][0]["severity"], "warning");
        assert_eq!(json["diagnostics"][0]["code"], "no_stages");
    }
}
