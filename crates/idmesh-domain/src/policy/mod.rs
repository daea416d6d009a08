//! Policy model: rules, targets, effects, and the published set.

pub mod loader;
pub mod predicate;

use serde::{Deserialize, Serialize};

pub use predicate::Predicate;

/// Rule id of the implicit terminal rule appended to every published set.
pub const DEFAULT_DENY_RULE_ID: &str = "DEFAULT-DENY-01";

/// Effect of a policy rule, also the decision of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Permit,
    Deny,
    Challenge,
}

/// Optional coarse pre-filter on the resource type and requested action.
///
/// A target narrows the rules considered before the condition runs. An
/// attribute named by the target but absent from the request makes the rule
/// a non-match, never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Target {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl Target {
    pub fn is_empty(&self) -> bool {
        self.resource_type.is_none() && self.action.is_none()
    }
}

/// A single declarative rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    #[serde(rename = "ruleId")]
    pub rule_id: String,
    pub effect: Effect,
    /// Higher priority rules are evaluated first.
    pub priority: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    pub condition: Predicate,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advice: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obligations: Vec<String>,
}

/// Top-level shape of a policy document file.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyDocument {
    pub policies: Vec<Policy>,
}

/// The immutable, published, ordered rule collection.
///
/// Rules are ordered by descending priority, then ascending rule id for
/// stability. The terminal [`DEFAULT_DENY_RULE_ID`] rule is always last and
/// always matches. A `PolicySet` is never mutated after construction; reload
/// replaces the published `Arc` as a whole.
#[derive(Debug)]
pub struct PolicySet {
    rules: Vec<Policy>,
}

impl PolicySet {
    /// Builds a published set from validated explicit rules.
    pub(crate) fn from_policies(mut explicit: Vec<Policy>) -> Self {
        explicit.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });
        explicit.push(default_deny_rule());
        Self { rules: explicit }
    }

    /// All rules in published order, terminal deny last.
    pub fn rules(&self) -> &[Policy] {
        &self.rules
    }

    /// Rules loaded from the document, excluding the implicit terminal deny.
    pub fn explicit_rules(&self) -> &[Policy] {
        &self.rules[..self.rules.len() - 1]
    }
}

fn default_deny_rule() -> Policy {
    Policy {
        rule_id: DEFAULT_DENY_RULE_ID.to_string(),
        effect: Effect::Deny,
        priority: i64::MIN,
        description: Some("implicit terminal deny".to_string()),
        target: None,
        // all([]) is vacuously true, so the terminal rule always matches
        condition: Predicate::All { args: Vec::new() },
        advice: Vec::new(),
        obligations: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, priority: i64) -> Policy {
        Policy {
            rule_id: id.to_string(),
            effect: Effect::Permit,
            priority,
            description: None,
            target: None,
            condition: Predicate::All { args: Vec::new() },
            advice: Vec::new(),
            obligations: Vec::new(),
        }
    }

    #[test]
    fn test_set_orders_by_priority_desc_then_rule_id() {
        let set = PolicySet::from_policies(vec![
            rule("B-RULE", 10),
            rule("A-RULE", 10),
            rule("C-RULE", 50),
        ]);

        let ids: Vec<&str> = set.rules().iter().map(|p| p.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["C-RULE", "A-RULE", "B-RULE", DEFAULT_DENY_RULE_ID]);
    }

    #[test]
    fn test_set_always_terminates_in_default_deny() {
        let set = PolicySet::from_policies(Vec::new());
        assert_eq!(set.rules().len(), 1);
        let last = set.rules().last().unwrap();
        assert_eq!(last.rule_id, DEFAULT_DENY_RULE_ID);
        assert_eq!(last.effect, Effect::Deny);
        assert!(set.explicit_rules().is_empty());
    }

    #[test]
    fn test_effect_serializes_capitalized() {
        assert_eq!(serde_json::to_string(&Effect::Permit).unwrap(), "\"Permit\"");
        assert_eq!(serde_json::to_string(&Effect::Deny).unwrap(), "\"Deny\"");
        assert_eq!(
            serde_json::to_string(&Effect::Challenge).unwrap(),
            "\"Challenge\""
        );
    }

    #[test]
    fn test_policy_rejects_unknown_fields() {
        let raw = r#"{
            "ruleId": "R1",
            "effect": "Permit",
            "priority": 1,
            "condition": {"op": "exists", "path": "subject.dept"},
            "bogus": true
        }"#;
        assert!(serde_json::from_str::<Policy>(raw).is_err());
    }
}
