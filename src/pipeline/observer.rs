//! Stage observation hooks.
//!
//! A [`PipelineObserver`] is notified before and after each stage of a
//! pipeline call. [`NoopObserver`] is what [`super::runner::Pipeline::call`]
//! uses internally; [`TimingObserver`] collects a [`StageReport`] per stage.

use std::time::{Duration, Instant};

use serde::Serialize;

/// Stage name for argument binding (before any user stage runs).
pub const STAGE_BIND: &str = "bind";
pub const STAGE_FILTER: &str = "filter";
pub const STAGE_RANK: &str = "rank";
pub const STAGE_ACTION: &str = "action";

/// Stages in execution order.
pub const STAGES: [&str; 4] = [STAGE_BIND, STAGE_FILTER, STAGE_RANK, STAGE_ACTION];

/// Measures wall time for one stage.
#[derive(Debug, Clone, Copy)]
pub struct StageClock(Instant);

impl StageClock {
    pub fn start() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

/// What happened in one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// Wall time spent in the stage.
    pub elapsed: Duration,
    /// Elements entering the stage.
    pub input_len: Option<usize>,
    /// Elements leaving the stage.
    pub output_len: Option<usize>,
}

impl StageReport {
    pub fn new(elapsed: Duration) -> Self {
        Self {
            elapsed,
            ..Default::default()
        }
    }

    /// Elements dropped by the stage, if both counts are known.
    pub fn dropped(&self) -> Option<usize> {
        Some(self.input_len?.saturating_sub(self.output_len?))
    }
}

pub struct StageReportBuilder {
    report: StageReport,
}

impl StageReportBuilder {
    pub fn new(elapsed: Duration) -> Self {
        Self {
            report: StageReport::new(elapsed),
        }
    }

    pub fn input_len(mut self, len: usize) -> Self {
        self.report.input_len = Some(len);
        self
    }

    pub fn output_len(mut self, len: usize) -> Self {
        self.report.output_len = Some(len);
        self
    }

    pub fn build(self) -> StageReport {
        self.report
    }
}

/// Callbacks at stage boundaries. Both methods default to no-ops.
///
/// `on_stage_end` is not called for a stage that fails.
pub trait PipelineObserver {
    fn on_stage_start(&mut self, _stage: &'static str) {}

    fn on_stage_end(&mut self, _stage: &'static str, _report: &StageReport) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Observer that keeps every [`StageReport`] in call order.
#[derive(Debug, Clone, Default)]
pub struct TimingObserver {
    reports: Vec<(&'static str, StageReport)>,
}

impl TimingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> &[(&'static str, StageReport)] {
        &self.reports
    }

    pub fn report(&self, stage: &str) -> Option<&StageReport> {
        self.reports
            .iter()
            .find(|(name, _)| *name == stage)
            .map(|(_, report)| report)
    }

    pub fn total(&self) -> Duration {
        self.reports.iter().map(|(_, r)| r.elapsed).sum()
    }

    pub fn clear(&mut self) {
        self.reports.clear();
    }
}

impl PipelineObserver for TimingObserver {
    fn on_stage_end(&mut self, stage: &'static str, report: &StageReport) {
        self.reports.push((stage, report.clone()));
    }
}
