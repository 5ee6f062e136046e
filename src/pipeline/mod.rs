//! Stage declaration, signature merging, validation and execution.
//!
//! ## Submodules
//!
//! - [`signature`]: Declared parameter lists and the signature inspector
//! - [`stage`]: Stage roles, shapes and per-stage invocation plans
//! - [`merge`]: Union of the stage shapes into one pipeline signature
//! - [`binding`]: Binding caller arguments against the merged signature
//! - [`ranking`]: Preference, `sort_key` and `sort` ranking
//! - [`config`]: Ranking flags and strictness
//! - [`validation`]: Declaration rules and diagnostics
//! - [`builder`]: Fluent declaration API
//! - [`runner`]: The built filter → rank → action pipeline
//! - [`observer`]: Per-stage timing and logging hooks

pub mod binding;
pub mod builder;
pub mod config;
pub mod error_code;
pub mod errors;
pub mod merge;
pub mod observer;
pub mod ranking;
pub mod runner;
pub mod signature;
pub mod stage;
pub mod validation;

pub use builder::PipelineBuilder;
pub use config::PipelineConfig;
pub use merge::MergedSignature;
pub use observer::{NoopObserver, PipelineObserver, StageReport, TimingObserver};
pub use ranking::RankingMode;
pub use runner::Pipeline;
pub use signature::{ParamList, StageSignature};
pub use stage::{InvocationPlan, StageRole};
