//! # rapid_controller
//!
//! Declarative filter → rank → action pipelines.
//!
//! A pipeline is declared from up to four stage callables bound to a common
//! receiver: a `filter` predicate, a pairwise `preference` or a `sort_key`,
//! and an `action` transform. Each stage declares its own extra parameters;
//! the builder merges them into one call signature and forwards to every
//! stage exactly the arguments it asked for.
//!
//! ## Features
//!
//! - **Signature merging**: positional extras, keyword parameters and
//!   `*args` / `**kwargs` captures unified across stages
//! - **Ranking shortcuts**: `sort`, `sort_key` and `sort_reverse`, validated
//!   at declaration time
//! - **Stable ranking**: the whole survivor set is reordered, ties keep their
//!   input order
//! - **Error pass-through**: stage errors reach the caller untouched

pub mod errors;
pub mod pipeline;
pub mod types;

// Re-export commonly used types
pub use errors::{ControllerError, Result};
pub use types::{BoxError, CallArgs, KeywordMap, StageArgs, Value};

pub use pipeline::error_code::ErrorCode;
pub use pipeline::errors::{DeclarationError, InvocationError};
pub use pipeline::validation::{ValidationEngine, ValidationReport};
pub use pipeline::{
    MergedSignature, NoopObserver, ParamList, Pipeline, PipelineBuilder, PipelineConfig,
    PipelineObserver, RankingMode, StageReport, StageRole, TimingObserver,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
