//! Three-valued predicate evaluation over attribute tuples.
//!
//! Missing attributes propagate `Undefined` through comparators instead of
//! collapsing to `false`, so a rule whose condition cannot be decided simply
//! does not match. Only `exists` yields a definite answer for an absent
//! attribute.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::policy::{Predicate, Target};

/// Kleene three-valued truth value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ternary {
    True,
    False,
    Undefined,
}

impl Ternary {
    pub fn from_bool(b: bool) -> Self {
        if b {
            Ternary::True
        } else {
            Ternary::False
        }
    }

    pub fn is_true(self) -> bool {
        self == Ternary::True
    }

    /// Kleene conjunction: False dominates, then Undefined.
    pub fn and(self, other: Ternary) -> Ternary {
        match (self, other) {
            (Ternary::False, _) | (_, Ternary::False) => Ternary::False,
            (Ternary::Undefined, _) | (_, Ternary::Undefined) => Ternary::Undefined,
            _ => Ternary::True,
        }
    }

    /// Kleene disjunction: True dominates, then Undefined.
    pub fn or(self, other: Ternary) -> Ternary {
        match (self, other) {
            (Ternary::True, _) | (_, Ternary::True) => Ternary::True,
            (Ternary::Undefined, _) | (_, Ternary::Undefined) => Ternary::Undefined,
            _ => Ternary::False,
        }
    }

    pub fn not(self) -> Ternary {
        match self {
            Ternary::True => Ternary::False,
            Ternary::False => Ternary::True,
            Ternary::Undefined => Ternary::Undefined,
        }
    }
}

/// The (subject, resource, context, action) tuple a decision is made over.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationRequest {
    #[serde(default)]
    pub subject: Map<String, Value>,
    #[serde(default)]
    pub resource: Map<String, Value>,
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl EvaluationRequest {
    /// Resolves a dot-separated attribute path to its value.
    ///
    /// Returns `None` for unknown roots, missing segments, traversal into
    /// non-objects, and explicit JSON nulls.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let root = match segments.next() {
            Some("subject") => &self.subject,
            Some("resource") => &self.resource,
            Some("context") => &self.context,
            _ => return None,
        };

        let mut current: Option<&Value> = None;
        for segment in segments {
            current = match current {
                None => root.get(segment),
                Some(Value::Object(map)) => map.get(segment),
                Some(_) => None,
            };
            current?;
        }
        current.filter(|v| !v.is_null())
    }
}

/// Evaluates a predicate against a request tuple.
pub fn eval(pred: &Predicate, req: &EvaluationRequest) -> Ternary {
    match pred {
        Predicate::All { args } => args
            .iter()
            .map(|p| eval(p, req))
            .fold(Ternary::True, Ternary::and),
        Predicate::Any { args } => args
            .iter()
            .map(|p| eval(p, req))
            .fold(Ternary::False, Ternary::or),
        Predicate::Not { arg } => eval(arg, req).not(),
        Predicate::Eq { path, value } => match req.lookup(path) {
            Some(actual) => Ternary::from_bool(value_eq(actual, value, ci_path(path))),
            None => Ternary::Undefined,
        },
        Predicate::Neq { path, value } => match req.lookup(path) {
            Some(actual) => Ternary::from_bool(!value_eq(actual, value, ci_path(path))),
            None => Ternary::Undefined,
        },
        Predicate::In { path, values } => match req.lookup(path) {
            // Set-valued attribute: true iff the intersection is non-empty.
            Some(Value::Array(items)) => Ternary::from_bool(items.iter().any(|item| {
                values.iter().any(|v| value_eq(item, v, ci_path(path)))
            })),
            Some(actual) => Ternary::from_bool(
                values.iter().any(|v| value_eq(actual, v, ci_path(path))),
            ),
            None => Ternary::Undefined,
        },
        Predicate::Contains { path, value } => match req.lookup(path) {
            Some(Value::Array(items)) => Ternary::from_bool(
                items.iter().any(|item| value_eq(item, value, ci_path(path))),
            ),
            Some(_) => Ternary::Undefined,
            None => Ternary::Undefined,
        },
        Predicate::Gte { path, value } => compare(req, path, value, |a, b| a >= b),
        Predicate::Gt { path, value } => compare(req, path, value, |a, b| a > b),
        Predicate::Lte { path, value } => compare(req, path, value, |a, b| a <= b),
        Predicate::Lt { path, value } => compare(req, path, value, |a, b| a < b),
        Predicate::Between { path, lo, hi } => {
            match (
                req.lookup(path).and_then(to_number),
                to_number(lo),
                to_number(hi),
            ) {
                (Some(v), Some(lo), Some(hi)) => Ternary::from_bool(lo <= v && v <= hi),
                _ => Ternary::Undefined,
            }
        }
        Predicate::Exists { path } => Ternary::from_bool(req.lookup(path).is_some()),
    }
}

/// Evaluates a rule target. An empty or absent target matches everything.
pub fn eval_target(target: Option<&Target>, req: &EvaluationRequest) -> Ternary {
    let Some(target) = target else {
        return Ternary::True;
    };
    let mut result = Ternary::True;
    if let Some(resource_type) = &target.resource_type {
        result = result.and(match req.resource.get("type") {
            Some(Value::String(actual)) => Ternary::from_bool(actual == resource_type),
            Some(_) => Ternary::False,
            None => Ternary::Undefined,
        });
    }
    if let Some(action) = &target.action {
        result = result.and(match &req.action {
            Some(actual) => Ternary::from_bool(actual == action),
            None => Ternary::Undefined,
        });
    }
    result
}

/// userName comparisons are case-insensitive; everything else is exact.
fn ci_path(path: &str) -> bool {
    path.rsplit('.').next() == Some("userName")
}

fn value_eq(actual: &Value, expected: &Value, case_insensitive: bool) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        (Value::String(a), Value::String(b)) => {
            if case_insensitive {
                a.eq_ignore_ascii_case(b)
            } else {
                a == b
            }
        }
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(x, y)| value_eq(x, y, case_insensitive))
        }
        _ => false,
    }
}

/// Coerces a value for ordering comparisons: numbers, numeric strings, and
/// "HH:MM" times (as minute-of-day).
fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .or_else(|| minute_of_day(trimmed).map(f64::from))
        }
        _ => None,
    }
}

fn compare(
    req: &EvaluationRequest,
    path: &str,
    literal: &Value,
    accept: impl Fn(f64, f64) -> bool,
) -> Ternary {
    match (req.lookup(path).and_then(to_number), to_number(literal)) {
        (Some(actual), Some(expected)) => Ternary::from_bool(accept(actual, expected)),
        _ => Ternary::Undefined,
    }
}

/// Parses "HH:MM" into minute-of-day. Hours 0-23, minutes 00-59.
pub(crate) fn minute_of_day(s: &str) -> Option<u32> {
    let (hours, minutes) = s.split_once(':')?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return None;
    }
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}
