//! Policy document loading, validation, and atomic publication.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use tracing::info;

use crate::error::{DomainError, DomainResult};
use crate::policy::{predicate, Policy, PolicyDocument, PolicySet, DEFAULT_DENY_RULE_ID};

/// Loads and validates policy documents into immutable [`PolicySet`]s.
pub struct PolicyLoader;

impl PolicyLoader {
    /// Reads, parses, and validates the policy file at `path`.
    pub fn load(path: impl AsRef<Path>) -> DomainResult<PolicySet> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| DomainError::PolicyIo {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&raw)
    }

    /// Parses and validates a policy document from a JSON string.
    pub fn parse(raw: &str) -> DomainResult<PolicySet> {
        let document: PolicyDocument =
            serde_json::from_str(raw).map_err(|e| DomainError::PolicyParse {
                message: e.to_string(),
            })?;
        Self::validate(&document.policies)?;
        Ok(PolicySet::from_policies(document.policies))
    }

    fn validate(policies: &[Policy]) -> DomainResult<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for policy in policies {
            let rule_id = policy.rule_id.trim();
            if rule_id.is_empty() {
                return Err(DomainError::PolicySemantic {
                    rule_id: policy.rule_id.clone(),
                    message: "ruleId must not be empty".to_string(),
                });
            }
            if rule_id == DEFAULT_DENY_RULE_ID {
                return Err(DomainError::PolicySemantic {
                    rule_id: policy.rule_id.clone(),
                    message: format!("ruleId '{DEFAULT_DENY_RULE_ID}' is reserved"),
                });
            }
            if !seen.insert(rule_id) {
                return Err(DomainError::PolicySemantic {
                    rule_id: policy.rule_id.clone(),
                    message: "duplicate ruleId".to_string(),
                });
            }
            predicate::validate(&policy.condition).map_err(|message| {
                DomainError::PolicySemantic {
                    rule_id: policy.rule_id.clone(),
                    message,
                }
            })?;
        }
        Ok(())
    }

    /// Writes the default policy document if `path` does not exist yet,
    /// creating parent directories as needed.
    pub fn ensure_file(path: impl AsRef<Path>) -> DomainResult<()> {
        let path = path.as_ref();
        if path.exists() {
            return Ok(());
        }
        let io_err = |e: std::io::Error| DomainError::PolicyIo {
            path: path.display().to_string(),
            message: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, DEFAULT_POLICIES_JSON).map_err(io_err)?;
        info!(path = %path.display(), "wrote default policy document");
        Ok(())
    }
}

/// Holder of the currently published [`PolicySet`].
///
/// Evaluators take one [`snapshot`](PolicyStore::snapshot) per evaluation and
/// use it throughout; [`publish`](PolicyStore::publish) swaps the reference so
/// in-flight evaluations keep their pre-swap view. The lock is only held for
/// the pointer clone, never across evaluation.
pub struct PolicyStore {
    current: RwLock<Arc<PolicySet>>,
}

impl PolicyStore {
    pub fn new(set: PolicySet) -> Self {
        Self {
            current: RwLock::new(Arc::new(set)),
        }
    }

    /// One atomic read of the published set.
    pub fn snapshot(&self) -> Arc<PolicySet> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Atomically replaces the published set.
    pub fn publish(&self, set: PolicySet) {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = Arc::new(set);
    }

    /// Loads `path` and publishes the result. On any failure the previously
    /// published set is retained. Returns the number of explicit rules.
    pub fn reload_from(&self, path: impl AsRef<Path>) -> DomainResult<usize> {
        let set = PolicyLoader::load(path)?;
        let count = set.explicit_rules().len();
        self.publish(set);
        Ok(count)
    }
}

/// Policy document written on first boot. Carries the bootstrap rule for the
/// reload endpoint so a fresh install can administer itself.
pub const DEFAULT_POLICIES_JSON: &str = r#"{
  "policies": [
    {
      "ruleId": "HR-PAYROLL-01",
      "effect": "Permit",
      "priority": 100,
      "description": "HR can read payroll from trusted devices",
      "condition": {
        "op": "all",
        "args": [
          { "op": "eq", "path": "subject.dept", "value": "HR" },
          { "op": "eq", "path": "resource.type", "value": "payroll" },
          { "op": "eq", "path": "context.deviceTrusted", "value": true }
        ]
      }
    },
    {
      "ruleId": "RISK-STEPUP-01",
      "effect": "Challenge",
      "priority": 200,
      "description": "High risk or unapproved geography requires step-up",
      "condition": {
        "op": "any",
        "args": [
          { "op": "gte", "path": "subject.riskScore", "value": 70 },
          { "op": "not", "arg": { "op": "in", "path": "context.geo", "values": ["CL", "CO"] } }
        ]
      },
      "advice": ["Additional authentication required"],
      "obligations": ["Initiate step-up authentication"]
    },
    {
      "ruleId": "ADMIN-OVERRIDE-01",
      "effect": "Permit",
      "priority": 150,
      "description": "Admins have access outside production",
      "condition": {
        "op": "all",
        "args": [
          { "op": "contains", "path": "subject.groups", "value": "ADMINS" },
          { "op": "neq", "path": "resource.env", "value": "prod" }
        ]
      }
    },
    {
      "ruleId": "ADMIN-RELOAD-01",
      "effect": "Permit",
      "priority": 300,
      "description": "Admins may reload the policy set",
      "target": { "resourceType": "policy_set", "action": "reload" },
      "condition": {
        "op": "contains", "path": "subject.groups", "value": "ADMINS"
      }
    }
  ]
}
"#;
