//! Ranking stage: explicit preference or one of the built-in shortcuts.
//!
//! At most one ranking source is active per pipeline, chosen by priority:
//! explicit preference > `sort_key` > `sort` > none. `sort_reverse` flips
//! the sign of whichever comparator wins. The combinations that are not
//! allowed are rejected earlier by the validation rules.
//!
//! Every mode sorts the *whole* surviving set with a stable merge sort, so
//! elements that compare equal keep their filtered order. Comparators are
//! fallible: the first error aborts the sort and is returned as-is.

use std::cmp::Ordering;

use serde::Serialize;

use super::binding::BoundCall;
use super::error_code::ErrorCode;
use super::errors::InvocationError;
use super::observer::STAGE_RANK;
use super::stage::{InvocationPlan, KeyOrderFn, NaturalOrderFn, PreferenceFn};
use crate::types::{BoxError, StageArgs};

// ─── Mode resolution ────────────────────────────────────────────────────────

/// Which ranking sources a declaration carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RankingSources {
    pub sort: bool,
    pub sort_reverse: bool,
    pub preference: bool,
    pub sort_key: bool,
}

/// The effective ranking of a built pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RankingMode {
    /// Keep the filtered order.
    #[default]
    None,
    /// User preference stage.
    ExplicitPreference { reverse: bool },
    /// Natural element order (`sort`).
    BuiltinComparator { reverse: bool },
    /// Order of the `sort_key` results.
    BuiltinKey { reverse: bool },
}

impl RankingMode {
    /// Pick the active mode by priority. Does not validate; see
    /// [`super::validation`] for the rejected combinations.
    pub fn resolve(sources: RankingSources) -> Self {
        let reverse = sources.sort_reverse;
        if sources.preference {
            Self::ExplicitPreference { reverse }
        } else if sources.sort_key {
            Self::BuiltinKey { reverse }
        } else if sources.sort {
            Self::BuiltinComparator { reverse }
        } else {
            Self::None
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn is_reversed(&self) -> bool {
        match self {
            Self::None => false,
            Self::ExplicitPreference { reverse }
            | Self::BuiltinComparator { reverse }
            | Self::BuiltinKey { reverse } => *reverse,
        }
    }
}

// ─── Comparators ────────────────────────────────────────────────────────────

fn unorderable() -> BoxError {
    InvocationError::new(
        ErrorCode::Unorderable,
        STAGE_RANK,
        "elements have no natural order between them",
    )
    .with_hint("Supply a preference or sort_key, or filter out incomparable values")
    .into()
}

/// Natural order of two values, failing when `partial_cmp` has no answer.
pub(crate) fn compare_natural<K: PartialOrd + ?Sized>(a: &K, b: &K) -> Result<Ordering, BoxError> {
    a.partial_cmp(b).ok_or_else(unorderable)
}

fn orient(ordering: Result<Ordering, BoxError>, reverse: bool) -> Result<Ordering, BoxError> {
    if reverse {
        ordering.map(Ordering::reverse)
    } else {
        ordering
    }
}

/// Comparator for the `sort` shortcut.
pub(crate) fn natural_order<T: PartialOrd + 'static>() -> Box<NaturalOrderFn<T>> {
    Box::new(|a: &T, b: &T| compare_natural(a, b))
}

/// Erase the key type of a `sort_key` stage: keys are computed once per
/// element, then ordered naturally.
pub(crate) fn keyed_order<S, T, K, F>(key: F) -> Box<KeyOrderFn<S, T>>
where
    S: 'static,
    T: 'static,
    K: PartialOrd,
    F: Fn(&S, &T, &StageArgs) -> Result<K, BoxError> + Send + Sync + 'static,
{
    Box::new(
        move |receiver: &S, items: &[T], args: &StageArgs, reverse: bool| {
            let keys = items
                .iter()
                .map(|item| key(receiver, item, args))
                .collect::<Result<Vec<K>, BoxError>>()?;
            try_stable_order(keys.len(), |i, j| {
                orient(compare_natural(&keys[i], &keys[j]), reverse)
            })
        },
    )
}

// ─── Stable fallible sort ───────────────────────────────────────────────────

/// Stable bottom-up merge sort over `0..len`, returning the sorted index
/// order. `cmp(i, j)` compares the elements at indices `i` and `j`; on a tie
/// the left run wins, which keeps equal elements in input order.
pub(crate) fn try_stable_order<F>(len: usize, mut cmp: F) -> Result<Vec<usize>, BoxError>
where
    F: FnMut(usize, usize) -> Result<Ordering, BoxError>,
{
    let mut order: Vec<usize> = (0..len).collect();
    if len < 2 {
        return Ok(order);
    }
    let mut buf = vec![0usize; len];
    let mut width = 1;
    while width < len {
        let mut start = 0;
        while start < len {
            let mid = (start + width).min(len);
            let end = (start + 2 * width).min(len);
            let (mut i, mut j, mut k) = (start, mid, start);
            while i < mid && j < end {
                if cmp(order[i], order[j])? == Ordering::Greater {
                    buf[k] = order[j];
                    j += 1;
                } else {
                    buf[k] = order[i];
                    i += 1;
                }
                k += 1;
            }
            buf[k..k + (mid - i)].copy_from_slice(&order[i..mid]);
            k += mid - i;
            buf[k..k + (end - j)].copy_from_slice(&order[j..end]);
            start = end;
        }
        std::mem::swap(&mut order, &mut buf);
        width *= 2;
    }
    Ok(order)
}

/// Reorder `items` by `order` (a permutation of its indices).
pub(crate) fn permute<T>(items: Vec<T>, order: &[usize]) -> Vec<T> {
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    order.iter().filter_map(|&i| slots[i].take()).collect()
}

// ─── Executable ranking ─────────────────────────────────────────────────────

/// The ranking step of a built pipeline.
pub(crate) enum Ranker<S, T> {
    None,
    Preference {
        func: Box<PreferenceFn<S, T>>,
        plan: InvocationPlan,
        reverse: bool,
    },
    Natural {
        order: Box<NaturalOrderFn<T>>,
        reverse: bool,
    },
    Keyed {
        func: Box<KeyOrderFn<S, T>>,
        plan: InvocationPlan,
        reverse: bool,
    },
}

impl<S, T> Ranker<S, T> {
    /// Fully reorder `items`.
    pub(crate) fn rank(&self, receiver: &S, items: Vec<T>, call: &BoundCall) -> Result<Vec<T>, BoxError> {
        let order = match self {
            Self::None => return Ok(items),
            Self::Preference {
                func,
                plan,
                reverse,
            } => {
                let args = plan.bind(call);
                try_stable_order(items.len(), |i, j| {
                    orient(func(receiver, &items[i], &items[j], &args), *reverse)
                })?
            }
            Self::Natural { order, reverse } => try_stable_order(items.len(), |i, j| {
                orient(order(&items[i], &items[j]), *reverse)
            })?,
            Self::Keyed {
                func,
                plan,
                reverse,
            } => {
                let args = plan.bind(call);
                func(receiver, &items, &args, *reverse)?
            }
        };
        Ok(permute(items, &order))
    }
}
