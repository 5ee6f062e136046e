//! Invocation-time argument binding.
//!
//! A pipeline call carries `elements` plus a [`CallArgs`] payload. Before any
//! stage runs, that payload is bound once against the [`MergedSignature`]:
//! every positional slot and keyword gets a value (caller's, or the merged
//! default) and any surplus is routed into the `*args` / `**kwargs`
//! payloads. Each stage then picks its own subset through its
//! [`InvocationPlan`](super::stage::InvocationPlan).

use super::error_code::ErrorCode;
use super::errors::InvocationError;
use super::merge::MergedSignature;
use super::observer::STAGE_BIND;
use super::stage::positional_slot_name;
use crate::types::{CallArgs, KeywordMap, Value};

/// Caller arguments bound against a [`MergedSignature`].
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct BoundCall {
    /// One value per merged positional slot.
    pub positional: Vec<Value>,
    /// One value per merged keyword parameter.
    pub keywords: KeywordMap,
    pub varargs: Vec<Value>,
    pub varkw: KeywordMap,
}

/// Bind `args` against `merged`.
pub(crate) fn bind_call(
    merged: &MergedSignature,
    args: CallArgs,
) -> Result<BoundCall, InvocationError> {
    let CallArgs {
        mut positional,
        keywords: mut supplied,
    } = args;

    let slots = merged.extra_positional_count();
    let required = merged.required_positional_count();
    if positional.len() < required {
        return Err(InvocationError::new(
            ErrorCode::MissingArgument,
            STAGE_BIND,
            format!(
                "missing required positional argument '{}'",
                positional_slot_name(positional.len())
            ),
        )
        .with_hint(format!("The pipeline takes {required} required extra argument(s)")));
    }

    let varargs = if positional.len() > slots {
        if !merged.has_positional_capture() {
            return Err(InvocationError::new(
                ErrorCode::UnexpectedArgument,
                STAGE_BIND,
                format!(
                    "takes at most {slots} extra positional argument(s) but {} were given",
                    positional.len()
                ),
            ));
        }
        positional.split_off(slots)
    } else {
        Vec::new()
    };

    for index in positional.len()..slots {
        // Slots past `required` are optional, so the merger gave them a default.
        let default = merged.positional_default(index).cloned().ok_or_else(|| {
            InvocationError::new(
                ErrorCode::MissingArgument,
                STAGE_BIND,
                format!(
                    "missing required positional argument '{}'",
                    positional_slot_name(index)
                ),
            )
        })?;
        positional.push(default);
    }

    let mut keywords = KeywordMap::new();
    for param in merged.keyword_params() {
        let value = match supplied.remove(&param.name) {
            Some(value) => value,
            None => param.default.clone().ok_or_else(|| {
                InvocationError::new(
                    ErrorCode::MissingArgument,
                    STAGE_BIND,
                    format!("missing required keyword argument '{}'", param.name),
                )
            })?,
        };
        keywords.insert(param.name.clone(), value);
    }

    if !supplied.is_empty() && !merged.has_keyword_capture() {
        let mut names: Vec<_> = supplied.keys().cloned().collect();
        names.sort();
        return Err(InvocationError::new(
            ErrorCode::UnexpectedKeyword,
            STAGE_BIND,
            format!("unexpected keyword argument(s): {}", names.join(", ")),
        ));
    }

    Ok(BoundCall {
        positional,
        keywords,
        varargs,
        varkw: supplied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::merge::merge;
    use crate::pipeline::signature::{inspect, ParamList};
    use crate::pipeline::stage::{StageRole, StageShape};
    use serde_json::json;

    fn merged(lists: &[(StageRole, ParamList)]) -> MergedSignature {
        let shapes: Vec<StageShape> = lists
            .iter()
            .map(|(role, list)| StageShape::new(*role, inspect(list, &role.path()).unwrap()))
            .collect();
        let refs: Vec<&StageShape> = shapes.iter().collect();
        merge(&refs)
    }

    fn action(list: ParamList) -> MergedSignature {
        merged(&[(StageRole::Action, list)])
    }

    #[test]
    fn test_empty_signature_accepts_nothing() {
        let sig = merge(&[]);
        assert!(bind_call(&sig, CallArgs::new()).is_ok());
        let err = bind_call(&sig, CallArgs::new().arg(1)).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnexpectedArgument);
        let err = bind_call(&sig, CallArgs::new().kwarg("k", 1)).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnexpectedKeyword);
    }

    #[test]
    fn test_missing_required_positional() {
        let sig = action(ParamList::method("action").positional("chosen").positional("x"));
        let err = bind_call(&sig, CallArgs::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingArgument);
        assert!(err.message.contains("arg_0"));
    }

    #[test]
    fn test_optional_slot_takes_default() {
        let sig = action(
            ParamList::method("action")
                .positional("chosen")
                .positional_default("x", 4),
        );
        let bound = bind_call(&sig, CallArgs::new()).unwrap();
        assert_eq!(bound.positional, vec![json!(4)]);
        let bound = bind_call(&sig, CallArgs::new().arg(7)).unwrap();
        assert_eq!(bound.positional, vec![json!(7)]);
    }

    #[test]
    fn test_surplus_positional_goes_to_capture() {
        let sig = action(
            ParamList::method("action")
                .positional("chosen")
                .positional("x")
                .var_positional("args"),
        );
        let bound = bind_call(&sig, CallArgs::new().arg(1).arg(2).arg(3)).unwrap();
        assert_eq!(bound.positional, vec![json!(1)]);
        assert_eq!(bound.varargs, vec![json!(2), json!(3)]);
    }

    #[test]
    fn test_keywords_default_and_override() {
        let sig = action(ParamList::method("action").positional("chosen").keyword("k", 1));
        let bound = bind_call(&sig, CallArgs::new()).unwrap();
        assert_eq!(bound.keywords["k"], json!(1));
        let bound = bind_call(&sig, CallArgs::new().kwarg("k", 10)).unwrap();
        assert_eq!(bound.keywords["k"], json!(10));
    }

    #[test]
    fn test_required_keyword_missing() {
        let sig = action(ParamList::method("action").keyword_required("mode"));
        let err = bind_call(&sig, CallArgs::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingArgument);
        assert!(err.message.contains("mode"));
    }

    #[test]
    fn test_unknown_keyword_goes_to_capture() {
        let sig = action(
            ParamList::method("action")
                .positional("chosen")
                .keyword("k", 1)
                .var_keyword("kwargs"),
        );
        let bound = bind_call(&sig, CallArgs::new().kwarg("k", 2).kwarg("other", "x")).unwrap();
        assert_eq!(bound.keywords["k"], json!(2));
        assert_eq!(bound.varkw["other"], json!("x"));
        assert!(!bound.varkw.contains_key("k"));
    }

    #[test]
    fn test_first_stage_default_is_authoritative() {
        let sig = merged(&[
            (StageRole::Action, ParamList::method("action").keyword("k", 1)),
            (StageRole::Filter, ParamList::method("filter").keyword("k", 2)),
        ]);
        let bound = bind_call(&sig, CallArgs::new()).unwrap();
        assert_eq!(bound.keywords["k"], json!(1));
    }
}
