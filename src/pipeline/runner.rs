//! Pipeline runner: executes filter → rank → action.
//!
//! A [`Pipeline`] is the immutable result of
//! [`PipelineBuilder::build`](super::builder::PipelineBuilder::build). Each
//! invocation binds the caller's [`CallArgs`] once against the merged
//! signature, then runs the stages in their fixed order, notifying an
//! optional [`PipelineObserver`] at each boundary.
//!
//! Errors raised by stage callables are returned as the same box the stage
//! produced, so callers can `downcast_ref` to their own error types. No
//! partial result is ever returned.

use std::fmt;

use super::binding::bind_call;
use super::merge::MergedSignature;
use super::observer::{
    NoopObserver, PipelineObserver, StageClock, StageReport, StageReportBuilder, STAGE_ACTION,
    STAGE_BIND, STAGE_FILTER, STAGE_RANK,
};
use super::ranking::{Ranker, RankingMode};
use super::stage::{ActionFn, FilterFn, InvocationPlan, StageRole};
use crate::types::{BoxError, CallArgs};

// ---------------------------------------------------------------------------
// Conditional tracing support
// ---------------------------------------------------------------------------

/// Enter a tracing span for a pipeline stage (when the `tracing` feature is
/// enabled). When disabled, this is a no-op and the compiler eliminates it.
macro_rules! trace_stage {
    ($name:expr) => {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("pipeline_stage", stage = $name).entered();
    };
}

/// A built stage callable with the arguments it is invoked with.
pub(crate) struct Stage<F: ?Sized> {
    pub(crate) func: Box<F>,
    pub(crate) plan: InvocationPlan,
}

// ============================================================================
// Pipeline
// ============================================================================

/// A composed filter → rank → action pipeline.
///
/// `S` is the receiver bound to every stage, `T` the element type and `U` the
/// output type. A pipeline holds no mutable state and is `Send + Sync`, so one
/// instance can serve concurrent callers.
pub struct Pipeline<S, T, U = T> {
    pub(crate) merged: MergedSignature,
    pub(crate) mode: RankingMode,
    pub(crate) filter: Option<Stage<FilterFn<S, T>>>,
    pub(crate) ranker: Ranker<S, T>,
    pub(crate) action: Box<ActionFn<S, T, U>>,
    /// `None` for the identity action.
    pub(crate) action_plan: Option<InvocationPlan>,
    /// Plans of the invoked stages, in role priority order.
    pub(crate) plans: Vec<InvocationPlan>,
}

impl<S, T, U> Pipeline<S, T, U> {
    /// The call shape the pipeline exposes beyond `elements`.
    pub fn signature(&self) -> &MergedSignature {
        &self.merged
    }

    pub fn ranking_mode(&self) -> RankingMode {
        self.mode
    }

    /// Roles of the stages the pipeline invokes, in role priority order. A
    /// `sort_key` shadowed by a preference is not listed.
    pub fn stages(&self) -> Vec<StageRole> {
        self.plans.iter().map(|p| p.role).collect()
    }

    /// How `role` is invoked, if it was declared.
    pub fn invocation_plan(&self, role: StageRole) -> Option<&InvocationPlan> {
        self.plans.iter().find(|p| p.role == role)
    }

    /// Invoke with no extra arguments.
    pub fn run(&self, receiver: &S, elements: Vec<T>) -> Result<Vec<U>, BoxError> {
        self.call(receiver, elements, CallArgs::default())
    }

    /// Invoke with caller-supplied extra arguments.
    pub fn call(&self, receiver: &S, elements: Vec<T>, args: CallArgs) -> Result<Vec<U>, BoxError> {
        self.call_with_observer(receiver, elements, args, &mut NoopObserver)
    }

    /// Invoke, reporting each stage to `observer`.
    pub fn call_with_observer(
        &self,
        receiver: &S,
        elements: Vec<T>,
        args: CallArgs,
        observer: &mut impl PipelineObserver,
    ) -> Result<Vec<U>, BoxError> {
        // Stage 0: Bind arguments
        let call = {
            trace_stage!(STAGE_BIND);
            observer.on_stage_start(STAGE_BIND);
            let clock = StageClock::start();
            let call = bind_call(&self.merged, args)?;
            observer.on_stage_end(STAGE_BIND, &StageReport::new(clock.elapsed()));
            call
        };

        // Stage 1: Filter
        let survivors = {
            trace_stage!(STAGE_FILTER);
            observer.on_stage_start(STAGE_FILTER);
            let clock = StageClock::start();
            let input_len = elements.len();
            let survivors = match &self.filter {
                Some(filter) => {
                    let stage_args = filter.plan.bind(&call);
                    let mut kept = Vec::with_capacity(input_len);
                    for chosen in elements {
                        if (filter.func)(receiver, &chosen, &stage_args)? {
                            kept.push(chosen);
                        }
                    }
                    kept
                }
                None => elements,
            };
            let report = StageReportBuilder::new(clock.elapsed())
                .input_len(input_len)
                .output_len(survivors.len())
                .build();
            observer.on_stage_end(STAGE_FILTER, &report);
            survivors
        };

        // Stage 2: Rank
        let ranked = {
            trace_stage!(STAGE_RANK);
            observer.on_stage_start(STAGE_RANK);
            let clock = StageClock::start();
            let len = survivors.len();
            let ranked = self.ranker.rank(receiver, survivors, &call)?;
            let report = StageReportBuilder::new(clock.elapsed())
                .input_len(len)
                .output_len(ranked.len())
                .build();
            observer.on_stage_end(STAGE_RANK, &report);
            ranked
        };

        // Stage 3: Action
        trace_stage!(STAGE_ACTION);
        observer.on_stage_start(STAGE_ACTION);
        let clock = StageClock::start();
        let len = ranked.len();
        let stage_args = self
            .action_plan
            .as_ref()
            .map(|plan| plan.bind(&call))
            .unwrap_or_default();
        let output = ranked
            .into_iter()
            .map(|chosen| (self.action)(receiver, chosen, &stage_args))
            .collect::<Result<Vec<U>, BoxError>>()?;
        let report = StageReportBuilder::new(clock.elapsed())
            .input_len(len)
            .output_len(output.len())
            .build();
        observer.on_stage_end(STAGE_ACTION, &report);

        Ok(output)
    }
}

impl<S, T, U> fmt::Debug for Pipeline<S, T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("signature", &self.merged.render())
            .field("mode", &self.mode)
            .field("stages", &self.stages())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::builder::PipelineBuilder;
    use crate::pipeline::observer::TimingObserver;
    use crate::pipeline::signature::ParamList;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn chosen(name: &str) -> ParamList {
        ParamList::method(name).positional("chosen")
    }

    #[test]
    fn test_scenario_filter_sort_identity() {
        let pipeline = PipelineBuilder::<(), i64>::new()
            .sort(true)
            .filter(chosen("filter"), |_, x: &i64, _| Ok(*x > 2))
            .action(chosen("action"), |_, x: i64, _| Ok(x))
            .build()
            .unwrap();
        assert_eq!(pipeline.run(&(), vec![5, 3, 9, 1]).unwrap(), [3, 5, 9]);
    }

    #[test]
    fn test_observer_sees_every_stage() {
        let pipeline = PipelineBuilder::<(), i64>::new()
            .filter(chosen("filter"), |_, x: &i64, _| Ok(*x % 2 == 0))
            .build()
            .unwrap();
        let mut obs = TimingObserver::new();
        pipeline
            .call_with_observer(&(), vec![1, 2, 3, 4], CallArgs::new(), &mut obs)
            .unwrap();
        let names: Vec<_> = obs.reports().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, [STAGE_BIND, STAGE_FILTER, STAGE_RANK, STAGE_ACTION]);
        assert_eq!(obs.report(STAGE_FILTER).unwrap().dropped(), Some(2));
    }

    #[test]
    fn test_failed_stage_not_reported_as_ended() {
        let pipeline = PipelineBuilder::<(), i64>::new()
            .filter(chosen("filter"), |_, _, _| Err("nope".into()))
            .build()
            .unwrap();
        let mut obs = TimingObserver::new();
        let err = pipeline
            .call_with_observer(&(), vec![1], CallArgs::new(), &mut obs)
            .unwrap_err();
        assert_eq!(err.to_string(), "nope");
        assert!(obs.report(STAGE_FILTER).is_none());
        assert!(obs.report(STAGE_BIND).is_some());
    }

    #[test]
    fn test_error_stops_later_stages() {
        let actions = AtomicUsize::new(0);
        let pipeline = PipelineBuilder::<AtomicUsize, i64>::new()
            .filter(chosen("filter"), |_, x: &i64, _| {
                if *x == 3 {
                    Err("three".into())
                } else {
                    Ok(true)
                }
            })
            .action(chosen("action"), |count: &AtomicUsize, x: i64, _| {
                count.fetch_add(1, AtomicOrdering::SeqCst);
                Ok(x)
            })
            .build()
            .unwrap();
        assert!(pipeline.run(&actions, vec![1, 2, 3]).is_err());
        assert_eq!(actions.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn test_empty_input() {
        let pipeline = PipelineBuilder::<(), i64>::new().sort(true).build().unwrap();
        assert!(pipeline.run(&(), vec![]).unwrap().is_empty());
    }

    #[test]
    fn test_introspection() {
        let pipeline = PipelineBuilder::<(), i64>::new()
            .filter(chosen("filter"), |_, _, _| Ok(true))
            .action(
                ParamList::method("action").positional("chosen").positional("n"),
                |_, x: i64, _| Ok(x),
            )
            .build()
            .unwrap();
        assert_eq!(pipeline.stages(), [StageRole::Action, StageRole::Filter]);
        assert_eq!(pipeline.signature().extra_positional_count(), 1);
        let plan = pipeline.invocation_plan(StageRole::Action).unwrap();
        assert_eq!(plan.positional_arg_names, ["chosen", "arg_0"]);
        assert!(pipeline.invocation_plan(StageRole::Filter).unwrap().is_reserved_only());
        assert!(pipeline.invocation_plan(StageRole::Preference).is_none());
        assert!(format!("{pipeline:?}").contains("(elements, arg_0)"));
    }

    #[test]
    fn test_pipeline_is_send_sync() {
        fn assert_send_sync<P: Send + Sync>() {}
        assert_send_sync::<Pipeline<(), i64, String>>();
    }

    #[test]
    fn test_shared_pipeline_across_threads() {
        let pipeline = PipelineBuilder::<(), i64>::new()
            .sort(true)
            .sort_reverse(true)
            .filter(chosen("filter"), |_, x: &i64, _| Ok(x % 3 != 0))
            .action(
                ParamList::method("action").positional("chosen").keyword("offset", 0),
                |_, x: i64, args| Ok(x + args.kwarg("offset").and_then(|v| v.as_i64()).unwrap_or(0)),
            )
            .build()
            .unwrap();
        let input: Vec<i64> = (0..200).map(|i| (i * 37) % 101).collect();
        let expected = pipeline
            .call(&(), input.clone(), CallArgs::new().kwarg("offset", 1))
            .unwrap();

        let (left, right) = std::thread::scope(|scope| {
            let worker = || {
                (0..20)
                    .map(|_| {
                        pipeline
                            .call(&(), input.clone(), CallArgs::new().kwarg("offset", 1))
                            .unwrap()
                    })
                    .collect::<Vec<_>>()
            };
            let left = scope.spawn(worker);
            let right = scope.spawn(worker);
            (left.join().unwrap(), right.join().unwrap())
        });
        assert!(left.iter().chain(&right).all(|out| *out == expected));
        assert_eq!(left.len() + right.len(), 40);
    }
}
