//! idmesh-domain: ABAC policy evaluation core
//!
//! This crate contains the policy decision logic:
//! - Policy document model and predicate grammar
//! - Loader with semantic validation and atomic publication
//! - Three-valued predicate evaluator
//! - Rule engine combining matched rules into a decision
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                idmesh-domain                 │
//! ├─────────────────────────────────────────────┤
//! │  policy/   - Policy model, grammar, loader  │
//! │  eval/     - Three-valued predicate eval    │
//! │  engine/   - Rule combination (PDP)         │
//! └─────────────────────────────────────────────┘
//! ```

pub mod engine;
pub mod error;
pub mod eval;
pub mod policy;

// Re-export commonly used types at the crate root
pub use engine::{Decision, RuleEngine};
pub use error::{DomainError, DomainResult};
pub use eval::{EvaluationRequest, Ternary};
pub use policy::loader::{PolicyLoader, PolicyStore};
pub use policy::{Effect, Policy, PolicySet, DEFAULT_DENY_RULE_ID};
