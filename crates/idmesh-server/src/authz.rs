//! Authorization facade.
//!
//! Thin layer over the rule engine: attaches correlation identifiers, emits
//! an audit record per decision, and orchestrates policy reloads. The facade
//! returns the engine's decision verbatim; audit emission is best-effort and
//! never alters the outcome.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Map};
use tracing::info;
use uuid::Uuid;

use idmesh_domain::{
    Decision, DomainError, DomainResult, EvaluationRequest, PolicyStore, RuleEngine,
};

use crate::token::Claims;

/// Request header carrying the correlation identifier.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Per-request audit context.
#[derive(Debug, Clone)]
pub struct AuditContext {
    pub correlation_id: String,
    /// `sub` of the bearer that asked for the evaluation.
    pub sub: Option<String>,
}

impl AuditContext {
    pub fn new(correlation_id: Option<String>, sub: Option<String>) -> Self {
        Self {
            correlation_id: correlation_id.unwrap_or_else(new_correlation_id),
            sub,
        }
    }
}

/// Generates an opaque correlation identifier.
pub fn new_correlation_id() -> String {
    format!("authz-{}", &Uuid::new_v4().simple().to_string()[..12])
}

/// Facade over the rule engine.
pub struct AuthzService {
    engine: RuleEngine,
    policies: Arc<PolicyStore>,
    policies_path: PathBuf,
}

impl AuthzService {
    pub fn new(policies: Arc<PolicyStore>, policies_path: PathBuf) -> Self {
        Self {
            engine: RuleEngine::new(Arc::clone(&policies)),
            policies,
            policies_path,
        }
    }

    /// Evaluates a request and emits the audit record.
    pub fn evaluate(&self, request: &EvaluationRequest, audit: &AuditContext) -> Decision {
        let decision = self.engine.evaluate(request);
        info!(
            target: "audit",
            correlation_id = %audit.correlation_id,
            sub = audit.sub.as_deref().unwrap_or("-"),
            decision = ?decision.decision,
            matched = ?decision.reasons,
            "authorization decision"
        );
        decision
    }

    /// Decides whether the bearer may reload the policy set, by asking the
    /// engine itself: subject from the claims, resource `policy_set`, action
    /// `reload`. The bootstrap rule for this check ships in the default
    /// policy document.
    pub fn may_reload(&self, claims: &Claims, audit: &AuditContext) -> bool {
        let mut subject = Map::new();
        if let Some(dept) = &claims.dept {
            subject.insert("dept".to_string(), json!(dept));
        }
        subject.insert("groups".to_string(), json!(claims.groups));
        subject.insert("riskScore".to_string(), json!(claims.risk_score));

        let mut resource = Map::new();
        resource.insert("type".to_string(), json!("policy_set"));

        let request = EvaluationRequest {
            subject,
            resource,
            context: Map::new(),
            action: Some("reload".to_string()),
        };

        let decision = self.evaluate(&request, audit);
        decision.decision == idmesh_domain::Effect::Permit
    }

    /// Reloads the policy file and atomically publishes the new set. The
    /// published set is untouched on failure. Returns the number of explicit
    /// rules loaded.
    pub async fn reload(&self) -> DomainResult<usize> {
        let policies = Arc::clone(&self.policies);
        let path = self.policies_path.clone();
        let count = tokio::task::spawn_blocking(move || policies.reload_from(&path))
            .await
            .map_err(|e| DomainError::Evaluation {
                message: format!("reload task failed: {e}"),
            })??;
        info!(policies = count, "policy set reloaded");
        Ok(count)
    }
}

/// Extracts the correlation id from raw header value bytes, if usable.
pub fn correlation_id_from_header(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
}
