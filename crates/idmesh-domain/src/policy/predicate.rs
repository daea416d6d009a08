//! Predicate expression grammar for policy conditions.
//!
//! Conditions are structured JSON trees, not expression strings: each node is
//! an object tagged by `"op"`. The loader validates the tree once so the
//! evaluator never has to parse anything at decision time.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::eval::minute_of_day;

/// A node in a policy condition tree.
///
/// `all`/`any`/`not` combine sub-expressions; the remaining operators compare
/// the attribute at `path` against literal arguments. Paths are dot-separated
/// and rooted at `subject`, `resource`, or `context`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Predicate {
    All { args: Vec<Predicate> },
    Any { args: Vec<Predicate> },
    Not { arg: Box<Predicate> },
    Eq { path: String, value: Value },
    Neq { path: String, value: Value },
    In { path: String, values: Vec<Value> },
    Contains { path: String, value: Value },
    Gte { path: String, value: Value },
    Gt { path: String, value: Value },
    Lte { path: String, value: Value },
    Lt { path: String, value: Value },
    Between { path: String, lo: Value, hi: Value },
    Exists { path: String },
}

const PATH_ROOTS: [&str; 3] = ["subject", "resource", "context"];

/// Validates a predicate tree semantically.
///
/// Checks attribute path shape and literal types for each operator. Returns a
/// human-readable message on the first problem found; the loader attributes
/// it to the enclosing rule.
pub(crate) fn validate(pred: &Predicate) -> Result<(), String> {
    match pred {
        Predicate::All { args } | Predicate::Any { args } => {
            for arg in args {
                validate(arg)?;
            }
            Ok(())
        }
        Predicate::Not { arg } => validate(arg),
        Predicate::Eq { path, value } | Predicate::Neq { path, value } => {
            validate_path(path)?;
            validate_literal(path, value)
        }
        Predicate::In { path, values } => {
            validate_path(path)?;
            for value in values {
                validate_literal(path, value)?;
            }
            Ok(())
        }
        Predicate::Contains { path, value } => {
            validate_path(path)?;
            validate_literal(path, value)
        }
        Predicate::Gte { path, value }
        | Predicate::Gt { path, value }
        | Predicate::Lte { path, value }
        | Predicate::Lt { path, value } => {
            validate_path(path)?;
            validate_numeric_literal(path, value)
        }
        Predicate::Between { path, lo, hi } => {
            validate_path(path)?;
            validate_numeric_literal(path, lo)?;
            validate_numeric_literal(path, hi)
        }
        Predicate::Exists { path } => validate_path(path),
    }
}

fn validate_path(path: &str) -> Result<(), String> {
    let mut segments = path.split('.');
    let root = segments.next().unwrap_or_default();
    if !PATH_ROOTS.contains(&root) {
        return Err(format!(
            "attribute path '{path}' must be rooted at one of {PATH_ROOTS:?}"
        ));
    }
    let mut rest = 0usize;
    for segment in segments {
        if segment.is_empty() {
            return Err(format!("attribute path '{path}' has an empty segment"));
        }
        rest += 1;
    }
    if rest == 0 {
        return Err(format!(
            "attribute path '{path}' names a root but no attribute"
        ));
    }
    Ok(())
}

fn validate_literal(path: &str, value: &Value) -> Result<(), String> {
    match value {
        Value::Null => Err(format!(
            "literal for '{path}' must not be null (use the exists operator)"
        )),
        Value::Object(_) => Err(format!("literal for '{path}' must not be an object")),
        _ => Ok(()),
    }
}

/// Ordering comparators accept numbers, numeric strings, and "HH:MM" times.
fn validate_numeric_literal(path: &str, value: &Value) -> Result<(), String> {
    let ok = match value {
        Value::Number(_) => true,
        Value::String(s) => s.trim().parse::<f64>().is_ok() || minute_of_day(s).is_some(),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(format!(
            "ordering comparator on '{path}' requires a numeric or \"HH:MM\" literal, got {value}"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(raw: serde_json::Value) -> Predicate {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_parse_each_operator() {
        parse(json!({"op": "all", "args": []}));
        parse(json!({"op": "any", "args": [{"op": "exists", "path": "subject.dept"}]}));
        parse(json!({"op": "not", "arg": {"op": "exists", "path": "context.geo"}}));
        parse(json!({"op": "eq", "path": "subject.dept", "value": "HR"}));
        parse(json!({"op": "neq", "path": "resource.env", "value": "prod"}));
        parse(json!({"op": "in", "path": "context.geo", "values": ["CL", "CO"]}));
        parse(json!({"op": "contains", "path": "subject.groups", "value": "ADMINS"}));
        parse(json!({"op": "gte", "path": "subject.riskScore", "value": 70}));
        parse(json!({"op": "between", "path": "context.timeOfDay", "lo": "09:00", "hi": "18:00"}));
        parse(json!({"op": "exists", "path": "context.deviceTrusted"}));
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let raw = json!({"op": "matches", "path": "subject.dept", "value": ".*"});
        assert!(serde_json::from_value::<Predicate>(raw).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_path_root() {
        let pred = parse(json!({"op": "eq", "path": "user.dept", "value": "HR"}));
        let err = validate(&pred).unwrap_err();
        assert!(err.contains("rooted"));
    }

    #[test]
    fn test_validate_rejects_root_only_path() {
        let pred = parse(json!({"op": "exists", "path": "subject"}));
        assert!(validate(&pred).is_err());
    }

    #[test]
    fn test_validate_rejects_numeric_comparator_on_bool() {
        let pred = parse(json!({"op": "gte", "path": "subject.riskScore", "value": true}));
        let err = validate(&pred).unwrap_err();
        assert!(err.contains("numeric"));
    }

    #[test]
    fn test_validate_accepts_time_of_day_bounds() {
        let pred = parse(json!({
            "op": "between", "path": "context.timeOfDay", "lo": "08:30", "hi": "17:45"
        }));
        assert!(validate(&pred).is_ok());
    }

    #[test]
    fn test_validate_rejects_null_equality_literal() {
        let pred = parse(json!({"op": "eq", "path": "subject.dept", "value": null}));
        let err = validate(&pred).unwrap_err();
        assert!(err.contains("exists"));
    }

    #[test]
    fn test_validate_recurses_into_combinators() {
        let pred = parse(json!({
            "op": "any",
            "args": [
                {"op": "eq", "path": "subject.dept", "value": "HR"},
                {"op": "gt", "path": "resource.size", "value": []}
            ]
        }));
        assert!(validate(&pred).is_err());
    }
}
