//! Declaration-side pipeline builder.
//!
//! [`PipelineBuilder`] collects up to four stage callables (filter,
//! preference, sort_key, action), each with the [`ParamList`] describing its
//! parameters, plus the ranking flags. [`PipelineBuilder::build`] then
//! inspects every stage, runs the [`ValidationEngine`], merges the stage
//! shapes into one [`MergedSignature`](super::merge::MergedSignature) and
//! returns an immutable [`Pipeline`].
//!
//! # Usage
//!
//! ```rust
//! use rapid_controller::{CallArgs, ParamList, PipelineBuilder};
//!
//! struct Scorer {
//!     threshold: i64,
//! }
//!
//! let pipeline = PipelineBuilder::<Scorer, i64>::new()
//!     .sort(true)
//!     .filter(
//!         ParamList::method("filter").positional("chosen"),
//!         |s: &Scorer, chosen: &i64, _| Ok(*chosen > s.threshold),
//!     )
//!     .action(
//!         ParamList::method("action").positional("chosen").positional("scale"),
//!         |_, chosen: i64, args| {
//!             let scale = args.arg(0).and_then(|v| v.as_i64()).unwrap_or(1);
//!             Ok(chosen * scale)
//!         },
//!     )
//!     .build()?;
//!
//! let out = pipeline.call(&Scorer { threshold: 2 }, vec![5, 3, 9, 1], CallArgs::new().arg(10))?;
//! assert_eq!(out, [30, 50, 90]);
//! # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
//! ```
//!
//! # Element ordering
//!
//! `sort` and `config` are only available when the element type is
//! `PartialOrd`; the natural comparator is installed together with the flag.
//! Pairs that still fail to compare (`NaN`) are reported at invocation.

use std::cmp::Ordering;

use super::config::PipelineConfig;
use super::errors::DeclarationError;
use super::merge::merge;
use super::ranking::{keyed_order, natural_order, Ranker, RankingMode};
use super::runner::{Pipeline, Stage};
use super::signature::{inspect, ParamList};
use super::stage::{
    ActionFn, FilterFn, InvocationPlan, KeyOrderFn, NaturalOrderFn, PreferenceFn, StageRole,
    StageShape,
};
use super::validation::{
    Declaration, ValidationDiagnostic, ValidationEngine, ValidationReport, ValidationRule,
};
use crate::types::{BoxError, StageArgs};

/// A stage callable waiting to be built, with its declared parameters.
struct Declared<F: ?Sized> {
    params: ParamList,
    func: Box<F>,
}

fn identity<S, T>(_: &S, chosen: T, _: &StageArgs) -> Result<T, BoxError> {
    Ok(chosen)
}

/// Fluent builder for [`Pipeline`].
///
/// `S` is the receiver every stage is bound to, `T` the element type and `U`
/// the action's output type (`T` until an action is declared).
pub struct PipelineBuilder<S, T, U = T> {
    config: PipelineConfig,
    engine: ValidationEngine,
    natural: Option<Box<NaturalOrderFn<T>>>,
    filter: Option<Declared<FilterFn<S, T>>>,
    preference: Option<Declared<PreferenceFn<S, T>>>,
    sort_key: Option<Declared<KeyOrderFn<S, T>>>,
    action_params: Option<ParamList>,
    action: Box<ActionFn<S, T, U>>,
}

impl<S: 'static, T: 'static> PipelineBuilder<S, T, T> {
    /// An empty declaration: no stages, no ranking, identity action.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            engine: ValidationEngine::with_defaults(),
            natural: None,
            filter: None,
            preference: None,
            sort_key: None,
            action_params: None,
            action: Box::new(identity::<S, T>),
        }
    }
}

impl<S: 'static, T: 'static> Default for PipelineBuilder<S, T, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: 'static, T: PartialOrd + 'static, U: 'static> PipelineBuilder<S, T, U> {
    /// Rank survivors by their natural order.
    pub fn sort(mut self, sort: bool) -> Self {
        self.config.sort = sort;
        self.natural = sort.then(natural_order::<T>);
        self
    }

    /// Replace the whole config (flags, strictness, unknown fields).
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.natural = config.sort.then(natural_order::<T>);
        self.config = config;
        self
    }
}

impl<S: 'static, T: 'static, U: 'static> PipelineBuilder<S, T, U> {
    /// Flip whichever ranking ends up active.
    pub fn sort_reverse(mut self, reverse: bool) -> Self {
        self.config.sort_reverse = reverse;
        self
    }

    /// Treat unknown config fields as errors.
    pub fn strict(mut self, strict: bool) -> Self {
        self.config.strict = strict;
        self
    }

    /// Register an extra validation rule next to the default set.
    pub fn with_rule(mut self, rule: Box<dyn ValidationRule>) -> Self {
        self.engine.add_rule(rule);
        self
    }

    /// Declare the filter stage. `params` lists `chosen` then any extras.
    pub fn filter<F>(mut self, params: ParamList, f: F) -> Self
    where
        F: Fn(&S, &T, &StageArgs) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.filter = Some(Declared {
            params,
            func: Box::new(f),
        });
        self
    }

    /// Declare the preference stage. `params` lists `a`, `b` then any
    /// extras; `Ordering::Less` puts `a` first.
    pub fn preference<F>(mut self, params: ParamList, f: F) -> Self
    where
        F: Fn(&S, &T, &T, &StageArgs) -> Result<Ordering, BoxError> + Send + Sync + 'static,
    {
        self.preference = Some(Declared {
            params,
            func: Box::new(f),
        });
        self
    }

    /// Declare a key function; survivors are ranked by the natural order of
    /// their keys.
    pub fn sort_key<K, F>(mut self, params: ParamList, f: F) -> Self
    where
        K: PartialOrd + 'static,
        F: Fn(&S, &T, &StageArgs) -> Result<K, BoxError> + Send + Sync + 'static,
    {
        self.sort_key = Some(Declared {
            params,
            func: keyed_order(f),
        });
        self
    }

    /// Declare the action stage, changing the pipeline's output type.
    pub fn action<V, F>(self, params: ParamList, f: F) -> PipelineBuilder<S, T, V>
    where
        V: 'static,
        F: Fn(&S, T, &StageArgs) -> Result<V, BoxError> + Send + Sync + 'static,
    {
        PipelineBuilder {
            config: self.config,
            engine: self.engine,
            natural: self.natural,
            filter: self.filter,
            preference: self.preference,
            sort_key: self.sort_key,
            action_params: Some(params),
            action: Box::new(f),
        }
    }

    fn declared_params(&self) -> impl Iterator<Item = (StageRole, &ParamList)> {
        [
            (StageRole::Action, self.action_params.as_ref()),
            (StageRole::Filter, self.filter.as_ref().map(|d| &d.params)),
            (StageRole::Preference, self.preference.as_ref().map(|d| &d.params)),
            (StageRole::SortKey, self.sort_key.as_ref().map(|d| &d.params)),
        ]
        .into_iter()
        .filter_map(|(role, params)| params.map(|p| (role, p)))
    }

    /// Inspect every declared stage. Inspection failures are returned
    /// separately; the declaration then lacks those stages.
    fn declaration(&self) -> (Declaration, Vec<DeclarationError>) {
        let mut decl = Declaration::new(self.config.clone());
        let mut failures = Vec::new();
        for (role, params) in self.declared_params() {
            match inspect(params, &role.path()) {
                Ok(signature) => decl.set_shape(StageShape::new(role, signature)),
                Err(err) => failures.push(err),
            }
        }
        (decl, failures)
    }

    /// Every diagnostic `build` would act on, without building.
    pub fn validate(&self) -> ValidationReport {
        let (decl, failures) = self.declaration();
        let mut diagnostics: Vec<ValidationDiagnostic> =
            failures.into_iter().map(ValidationDiagnostic::error).collect();
        diagnostics.extend(self.engine.validate(&decl).diagnostics);
        ValidationReport { diagnostics }
    }

    /// Inspect, validate, merge and compose.
    ///
    /// Fails with the first inspection or validation error. Warnings are
    /// logged and otherwise ignored.
    pub fn build(self) -> Result<Pipeline<S, T, U>, DeclarationError> {
        let (decl, failures) = self.declaration();
        if let Some(err) = failures.into_iter().next() {
            return Err(err);
        }

        let report = self.engine.validate(&decl);
        #[cfg(feature = "tracing")]
        for warning in report.warnings() {
            tracing::warn!(code = %warning.code, path = %warning.path, "{}", warning.message);
        }
        if let Some(err) = report.into_first_error() {
            return Err(err);
        }

        let shapes = decl.active_shapes();
        let merged = merge(&shapes);
        let plans = shapes
            .iter()
            .map(|shape| shape.build_invocation_args(&merged))
            .collect::<Result<Vec<InvocationPlan>, _>>()?;
        let plan_for = |role: StageRole| plans.iter().find(|p| p.role == role).cloned();

        let mode = RankingMode::resolve(decl.ranking_sources());
        let reverse = mode.is_reversed();
        let ranker = match (mode, self.preference, self.sort_key, self.natural) {
            (RankingMode::ExplicitPreference { .. }, Some(pref), _, _) => {
                match plan_for(StageRole::Preference) {
                    Some(plan) => Ranker::Preference {
                        func: pref.func,
                        plan,
                        reverse,
                    },
                    None => Ranker::None,
                }
            }
            (RankingMode::BuiltinKey { .. }, _, Some(key), _) => match plan_for(StageRole::SortKey) {
                Some(plan) => Ranker::Keyed {
                    func: key.func,
                    plan,
                    reverse,
                },
                None => Ranker::None,
            },
            (RankingMode::BuiltinComparator { .. }, _, _, Some(order)) => {
                Ranker::Natural { order, reverse }
            }
            _ => Ranker::None,
        };

        let filter = match (self.filter, plan_for(StageRole::Filter)) {
            (Some(declared), Some(plan)) => Some(Stage {
                func: declared.func,
                plan,
            }),
            _ => None,
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(signature = %merged, mode = ?mode, stages = plans.len(), "pipeline built");

        Ok(Pipeline {
            action_plan: plan_for(StageRole::Action),
            merged,
            mode,
            filter,
            ranker,
            action: self.action,
            plans,
        })
    }
}
