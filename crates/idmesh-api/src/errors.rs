//! API error translation.
//!
//! Leaf services fail with typed kinds; this module translates them exactly
//! once at the boundary into a `{code, message}` JSON body with the mapped
//! status. Internal details are logged, not exposed.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use idmesh_domain::DomainError;
use idmesh_server::{AuthError, ScimError};

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip)]
    status: StatusCode,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_input", message)
    }

    pub fn unauthorized(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match &err {
            AuthError::BadCredentials => {
                ApiError::unauthorized("invalid_credentials", "invalid credentials")
            }
            AuthError::TokenMalformed => ApiError::unauthorized("token_malformed", "malformed token"),
            AuthError::TokenExpired => ApiError::unauthorized("token_expired", "token expired"),
            AuthError::TokenSignatureInvalid => {
                ApiError::unauthorized("token_signature_invalid", "token signature invalid")
            }
            AuthError::TokenAlgorithmMismatch => {
                ApiError::unauthorized("token_algorithm_mismatch", "token algorithm mismatch")
            }
            AuthError::InvalidRequest(message) => ApiError::bad_request(message.clone()),
            AuthError::Key(_) | AuthError::Hashing(_) | AuthError::Storage(_) => {
                error!("auth error: {err}");
                ApiError::internal("internal_error", "internal error")
            }
        }
    }
}

impl From<ScimError> for ApiError {
    fn from(err: ScimError) -> Self {
        match err {
            ScimError::NotFound { resource, id } => {
                ApiError::not_found(format!("{resource} not found: {id}"))
            }
            ScimError::Conflict(message) => ApiError::conflict(message),
            ScimError::Invalid(message) => ApiError::bad_request(message),
            ScimError::BadFilter(message) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "invalid_filter",
                format!("unsupported filter: {message}"),
            ),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let code = match &err {
            DomainError::PolicyParse { .. } => "policy_parse_error",
            DomainError::PolicySemantic { .. } => "policy_semantic_error",
            DomainError::PolicyIo { .. } => "policy_io_error",
            DomainError::Evaluation { .. } => "evaluation_error",
        };
        error!("domain error: {err}");
        ApiError::internal(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_statuses() {
        assert_eq!(
            ApiError::from(AuthError::BadCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::TokenExpired).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::InvalidRequest("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AuthError::Key("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_scim_error_statuses() {
        assert_eq!(
            ApiError::from(ScimError::NotFound {
                resource: "user",
                id: "usr_x".into()
            })
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(ScimError::Conflict("dup".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(ScimError::BadFilter("co".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_domain_error_is_internal() {
        let err = DomainError::PolicyParse {
            message: "bad json".into(),
        };
        let api = ApiError::from(err);
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.code, "policy_parse_error");
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let api = ApiError::from(AuthError::Key("secret key material".into()));
        assert_eq!(api.message, "internal error");
    }
}
