//! Rule engine: the policy decision point.
//!
//! One evaluation takes one snapshot of the published set, walks rules in
//! published order, and combines matched rules under deny-overrides with
//! challenge escalation. Malformed attribute data degrades to non-matching
//! rules; the engine itself never fails on input shape.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::eval::{eval, eval_target, EvaluationRequest};
use crate::policy::loader::PolicyStore;
use crate::policy::{Effect, Policy, PolicySet, DEFAULT_DENY_RULE_ID};

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision: Effect,
    pub reasons: Vec<String>,
    pub advice: Vec<String>,
    pub obligations: Vec<String>,
}

impl Decision {
    fn default_deny() -> Self {
        Self {
            decision: Effect::Deny,
            reasons: vec![reason(DEFAULT_DENY_RULE_ID)],
            advice: Vec::new(),
            obligations: Vec::new(),
        }
    }
}

fn reason(rule_id: &str) -> String {
    format!("ruleId: {rule_id}")
}

/// The policy decision point.
pub struct RuleEngine {
    policies: Arc<PolicyStore>,
}

impl RuleEngine {
    pub fn new(policies: Arc<PolicyStore>) -> Self {
        Self { policies }
    }

    /// Evaluates a request against the currently published set.
    pub fn evaluate(&self, request: &EvaluationRequest) -> Decision {
        let snapshot = self.policies.snapshot();
        Self::evaluate_against(&snapshot, request)
    }

    /// Evaluates a request against an explicit snapshot.
    pub fn evaluate_against(set: &PolicySet, request: &EvaluationRequest) -> Decision {
        let matched: Vec<&Policy> = set
            .explicit_rules()
            .iter()
            .filter(|policy| rule_matches(policy, request))
            .collect();

        if matched.is_empty() {
            debug!("no rule matched, terminal deny applies");
            return Decision::default_deny();
        }

        debug!(
            matched = ?matched.iter().map(|p| p.rule_id.as_str()).collect::<Vec<_>>(),
            "rules matched"
        );

        // Deny overrides. The reasons lead with the first matched Deny,
        // followed by the higher-priority matched rules that preceded it.
        if let Some(deny_pos) = matched.iter().position(|p| p.effect == Effect::Deny) {
            let mut contributing = vec![matched[deny_pos]];
            contributing.extend(matched[..deny_pos].iter().copied());
            return build_decision(Effect::Deny, &contributing);
        }

        if matched.iter().any(|p| p.effect == Effect::Challenge) {
            let contributing: Vec<&Policy> = matched
                .iter()
                .copied()
                .filter(|p| p.effect == Effect::Challenge)
                .collect();
            return build_decision(Effect::Challenge, &contributing);
        }

        let contributing: Vec<&Policy> = matched
            .iter()
            .copied()
            .filter(|p| p.effect == Effect::Permit)
            .collect();
        build_decision(Effect::Permit, &contributing)
    }
}

/// A rule matches iff `target AND condition` evaluates to true.
/// Undefined means non-match.
fn rule_matches(policy: &Policy, request: &EvaluationRequest) -> bool {
    eval_target(policy.target.as_ref(), request)
        .and(eval(&policy.condition, request))
        .is_true()
}

fn build_decision(effect: Effect, contributing: &[&Policy]) -> Decision {
    let mut reasons = Vec::with_capacity(contributing.len());
    let mut advice = Vec::new();
    let mut obligations = Vec::new();
    for policy in contributing {
        reasons.push(reason(&policy.rule_id));
        push_unique(&mut advice, &policy.advice);
        push_unique(&mut obligations, &policy.obligations);
    }
    Decision {
        decision: effect,
        reasons,
        advice,
        obligations,
    }
}

/// Order-preserving concatenation without duplicates.
fn push_unique(dst: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !dst.iter().any(|existing| existing == item) {
            dst.push(item.clone());
        }
    }
}
