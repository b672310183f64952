//! Evaluation of compiled filter expressions against log events.
//!
//! Evaluation is three-valued: comparisons over missing properties or
//! mismatched types yield an indeterminate result, which the final
//! boolean coercion treats as `false`. Predicates built here are pure —
//! the same event always produces the same answer.

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use super::expr::{BuiltInField, CompareOp, Expr};
use crate::models::event::LogEvent;

/// Result of evaluating a (sub-)expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EvalValue {
    /// Missing property, unrepresentable value or type-mismatched
    /// operation; coerces to `false`.
    Undefined,
    Bool(bool),
    Num(f64),
    Str(String),
    Timestamp(DateTime<FixedOffset>),
}

impl EvalValue {
    fn as_bool(&self) -> Option<bool> {
        match self {
            EvalValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

/// The outermost boolean coercion: only a definite `true` passes.
pub(crate) fn is_true(value: &EvalValue) -> bool {
    matches!(value, EvalValue::Bool(true))
}

pub(crate) fn evaluate(expr: &Expr, event: &LogEvent) -> EvalValue {
    match expr {
        Expr::Str(text) => EvalValue::Str(text.clone()),
        Expr::Num(value) => EvalValue::Num(*value),
        Expr::Bool(value) => EvalValue::Bool(*value),
        Expr::Null => EvalValue::Undefined,
        Expr::BuiltIn(field) => builtin_value(*field, event),
        Expr::Property(name) => event
            .property(name)
            .map(json_value)
            .unwrap_or(EvalValue::Undefined),
        Expr::Not(inner) => match evaluate(inner, event).as_bool() {
            Some(value) => EvalValue::Bool(!value),
            None => EvalValue::Undefined,
        },
        Expr::And(lhs, rhs) => kleene_and(
            evaluate(lhs, event).as_bool(),
            evaluate(rhs, event).as_bool(),
        ),
        Expr::Or(lhs, rhs) => kleene_or(
            evaluate(lhs, event).as_bool(),
            evaluate(rhs, event).as_bool(),
        ),
        Expr::Compare {
            op,
            case_insensitive,
            lhs,
            rhs,
        } => compare(
            *op,
            *case_insensitive,
            evaluate(lhs, event),
            evaluate(rhs, event),
        ),
        Expr::Like {
            negated,
            regex,
            value,
        } => match evaluate(value, event) {
            EvalValue::Str(text) => EvalValue::Bool(regex.is_match(&text) != *negated),
            _ => EvalValue::Undefined,
        },
    }
}

fn builtin_value(field: BuiltInField, event: &LogEvent) -> EvalValue {
    match field {
        BuiltInField::Exception => event
            .exception
            .clone()
            .map(EvalValue::Str)
            .unwrap_or(EvalValue::Undefined),
        BuiltInField::Level => EvalValue::Str(event.level.as_str().to_string()),
        BuiltInField::Message => EvalValue::Str(event.rendered_message.clone()),
        BuiltInField::MessageTemplate => EvalValue::Str(event.message_template.clone()),
        // the whole property bag is not a scalar; comparisons on it are
        // indeterminate
        BuiltInField::Properties => EvalValue::Undefined,
        BuiltInField::Timestamp => EvalValue::Timestamp(event.timestamp),
    }
}

fn json_value(value: &Value) -> EvalValue {
    match value {
        Value::Null => EvalValue::Undefined,
        Value::Bool(b) => EvalValue::Bool(*b),
        Value::Number(n) => n.as_f64().map(EvalValue::Num).unwrap_or(EvalValue::Undefined),
        Value::String(s) => EvalValue::Str(s.clone()),
        Value::Array(_) | Value::Object(_) => EvalValue::Undefined,
    }
}

fn kleene_and(lhs: Option<bool>, rhs: Option<bool>) -> EvalValue {
    match (lhs, rhs) {
        (Some(false), _) | (_, Some(false)) => EvalValue::Bool(false),
        (Some(true), Some(true)) => EvalValue::Bool(true),
        _ => EvalValue::Undefined,
    }
}

fn kleene_or(lhs: Option<bool>, rhs: Option<bool>) -> EvalValue {
    match (lhs, rhs) {
        (Some(true), _) | (_, Some(true)) => EvalValue::Bool(true),
        (Some(false), Some(false)) => EvalValue::Bool(false),
        _ => EvalValue::Undefined,
    }
}

fn compare(op: CompareOp, case_insensitive: bool, lhs: EvalValue, rhs: EvalValue) -> EvalValue {
    use std::cmp::Ordering;

    let ordering = match (&lhs, &rhs) {
        (EvalValue::Num(a), EvalValue::Num(b)) => a.partial_cmp(b),
        (EvalValue::Str(a), EvalValue::Str(b)) => {
            if case_insensitive {
                Some(a.to_lowercase().cmp(&b.to_lowercase()))
            } else {
                Some(a.cmp(b))
            }
        }
        (EvalValue::Bool(a), EvalValue::Bool(b)) => Some(a.cmp(b)),
        (EvalValue::Timestamp(a), EvalValue::Timestamp(b)) => Some(a.cmp(b)),
        // a timestamp compared against its textual form
        (EvalValue::Timestamp(a), EvalValue::Str(b)) => DateTime::parse_from_rfc3339(b)
            .ok()
            .map(|parsed| a.cmp(&parsed)),
        (EvalValue::Str(a), EvalValue::Timestamp(b)) => DateTime::parse_from_rfc3339(a)
            .ok()
            .map(|parsed| parsed.cmp(b)),
        _ => None,
    };

    let Some(ordering) = ordering else {
        return EvalValue::Undefined;
    };
    let result = match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
    };
    EvalValue::Bool(result)
}
