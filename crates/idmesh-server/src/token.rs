//! Bearer token issuance and validation.
//!
//! Supports the password and client_credentials grants. Signing key material
//! is loaded once at startup and immutable for the process lifetime; the
//! configured algorithm is pinned, so a token presented with any other
//! algorithm is rejected before signature verification.

use std::collections::HashMap;
use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use idmesh_storage::{RecordStore, StorageError};

use crate::config::ServiceConfig;

/// Authentication and token failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    BadCredentials,

    #[error("malformed token")]
    TokenMalformed,

    #[error("token expired")]
    TokenExpired,

    #[error("token signature invalid")]
    TokenSignatureInvalid,

    #[error("token algorithm mismatch")]
    TokenAlgorithmMismatch,

    /// The token request body itself is unusable.
    #[error("invalid token request: {0}")]
    InvalidRequest(String),

    #[error("signing key error: {0}")]
    Key(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Credential body for `POST /auth/token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Successful token response.
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub scope: String,
}

/// Claims carried by issued tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id or client id.
    pub sub: String,
    /// Space-separated granted scopes.
    pub scope: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dept: Option<String>,
    #[serde(rename = "riskScore")]
    pub risk_score: i64,
    pub iat: i64,
    pub exp: i64,
}

/// Attributes resolved from a verified credential.
struct Identity {
    sub: String,
    dept: Option<String>,
    groups: Vec<String>,
    risk_score: i64,
    scopes: Vec<String>,
}

/// A pre-configured client for the client_credentials grant.
#[derive(Debug, Clone)]
struct ClientEntry {
    secret: String,
    dept: String,
    groups: Vec<String>,
    risk_score: i64,
    scopes: Vec<String>,
}

fn builtin_clients() -> HashMap<String, ClientEntry> {
    let mut clients = HashMap::new();
    clients.insert(
        "test_client".to_string(),
        ClientEntry {
            secret: "test_secret".to_string(),
            dept: "IT".to_string(),
            groups: vec!["API_CLIENTS".to_string()],
            risk_score: 10,
            scopes: vec!["read".to_string(), "write".to_string()],
        },
    );
    clients.insert(
        "hr_app".to_string(),
        ClientEntry {
            secret: "hr_secret_2024".to_string(),
            dept: "HR".to_string(),
            groups: vec!["HR_READERS".to_string(), "HR_WRITERS".to_string()],
            risk_score: 15,
            scopes: vec![
                "read".to_string(),
                "write".to_string(),
                "hr:payroll".to_string(),
            ],
        },
    );
    clients
}

/// Scopes available to password-grant users.
const USER_SCOPES: [&str; 2] = ["read", "write"];

/// Issues and validates bearer tokens.
pub struct TokenService<S> {
    store: Arc<S>,
    clients: HashMap<String, ClientEntry>,
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expire_minutes: u64,
}

impl<S: RecordStore> TokenService<S> {
    /// Builds the service from configuration, loading key material once.
    pub fn from_config(config: &ServiceConfig, store: Arc<S>) -> Result<Self, AuthError> {
        let (algorithm, encoding_key, decoding_key) = match config.jwt_alg.as_str() {
            "HS256" => {
                let secret = config
                    .jwt_secret
                    .as_deref()
                    .ok_or_else(|| AuthError::Key("JWT_SECRET is not set".to_string()))?;
                (
                    Algorithm::HS256,
                    EncodingKey::from_secret(secret.as_bytes()),
                    DecodingKey::from_secret(secret.as_bytes()),
                )
            }
            "RS256" => {
                let private = config
                    .jwt_private_key
                    .as_deref()
                    .ok_or_else(|| AuthError::Key("JWT_PRIVATE_KEY is not set".to_string()))?;
                let public = config
                    .jwt_public_key
                    .as_deref()
                    .ok_or_else(|| AuthError::Key("JWT_PUBLIC_KEY is not set".to_string()))?;
                (
                    Algorithm::RS256,
                    EncodingKey::from_rsa_pem(private.as_bytes())
                        .map_err(|e| AuthError::Key(format!("invalid JWT_PRIVATE_KEY: {e}")))?,
                    DecodingKey::from_rsa_pem(public.as_bytes())
                        .map_err(|e| AuthError::Key(format!("invalid JWT_PUBLIC_KEY: {e}")))?,
                )
            }
            other => {
                return Err(AuthError::Key(format!("unsupported algorithm: {other}")));
            }
        };

        info!(algorithm = config.jwt_alg, "token service initialized");

        Ok(Self {
            store,
            clients: builtin_clients(),
            algorithm,
            encoding_key,
            decoding_key,
            expire_minutes: config.jwt_expire_minutes,
        })
    }

    /// Verifies a credential body and issues a signed token.
    pub async fn issue(&self, request: &TokenRequest) -> Result<TokenResponse, AuthError> {
        let identity = match request.grant_type.as_str() {
            "password" => self.password_identity(request).await?,
            "client_credentials" => self.client_identity(request)?,
            other => {
                return Err(AuthError::InvalidRequest(format!(
                    "unsupported grant_type: {other}"
                )))
            }
        };

        let scopes = grant_scopes(request.scope.as_deref(), &identity.scopes);
        let now = Utc::now().timestamp();
        let expires_in = self.expire_minutes * 60;
        let claims = Claims {
            sub: identity.sub,
            scope: scopes.join(" "),
            groups: identity.groups,
            dept: identity.dept,
            risk_score: identity.risk_score,
            iat: now,
            exp: now + expires_in as i64,
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Key(format!("token encoding failed: {e}")))?;

        info!(sub = %claims.sub, scope = %claims.scope, "token issued");

        Ok(TokenResponse {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in,
            scope: claims.scope,
        })
    }

    /// Parses and verifies a token, returning its claims.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::TokenMalformed)?;
        if header.alg != self.algorithm {
            return Err(AuthError::TokenAlgorithmMismatch);
        }

        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.validate_aud = false;

        let data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature => AuthError::TokenSignatureInvalid,
                ErrorKind::InvalidAlgorithm => AuthError::TokenAlgorithmMismatch,
                _ => AuthError::TokenMalformed,
            })?;

        Ok(data.claims)
    }

    async fn password_identity(&self, request: &TokenRequest) -> Result<Identity, AuthError> {
        let username = request
            .username
            .as_deref()
            .ok_or_else(|| AuthError::InvalidRequest("username is required".to_string()))?;
        let password = request
            .password
            .as_deref()
            .ok_or_else(|| AuthError::InvalidRequest("password is required".to_string()))?;

        let user = self
            .store
            .find_user_by_username(username)
            .await?
            .ok_or(AuthError::BadCredentials)?;

        let verified = user
            .password_hash
            .as_deref()
            .map(|hash| verify_password(hash, password))
            .unwrap_or(false);
        if !verified {
            warn!(username, "password verification failed");
            return Err(AuthError::BadCredentials);
        }
        if !user.active {
            warn!(username, "token refused for inactive user");
            return Err(AuthError::BadCredentials);
        }

        let groups = self
            .store
            .groups_containing_user(&user.id)
            .await?
            .into_iter()
            .map(|g| g.display_name)
            .collect();

        Ok(Identity {
            sub: user.id,
            dept: user.dept,
            groups,
            risk_score: user.risk_score,
            scopes: USER_SCOPES.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn client_identity(&self, request: &TokenRequest) -> Result<Identity, AuthError> {
        let client_id = request
            .client_id
            .as_deref()
            .ok_or_else(|| AuthError::InvalidRequest("client_id is required".to_string()))?;
        let client_secret = request
            .client_secret
            .as_deref()
            .ok_or_else(|| AuthError::InvalidRequest("client_secret is required".to_string()))?;

        let entry = self
            .clients
            .get(client_id)
            .filter(|entry| entry.secret == client_secret)
            .ok_or(AuthError::BadCredentials)?;

        Ok(Identity {
            sub: client_id.to_string(),
            dept: Some(entry.dept.clone()),
            groups: entry.groups.clone(),
            risk_score: entry.risk_score,
            scopes: entry.scopes.clone(),
        })
    }
}

/// Intersects the requested scopes with the credential's available scopes,
/// preserving the available order. An empty intersection grants `read`.
fn grant_scopes(requested: Option<&str>, available: &[String]) -> Vec<String> {
    let requested: Vec<&str> = requested.unwrap_or("read").split_whitespace().collect();
    let granted: Vec<String> = available
        .iter()
        .filter(|scope| requested.contains(&scope.as_str()))
        .cloned()
        .collect();
    if granted.is_empty() {
        vec!["read".to_string()]
    } else {
        granted
    }
}

/// Hashes a password into an argon2 PHC string with a fresh salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Verifies a password against a PHC string. Unparseable hashes fail closed.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use idmesh_storage::{GroupMember, MemoryRecordStore, StoredGroup, StoredUser};

    use super::*;

    fn test_config() -> ServiceConfig {
        ServiceConfig {
            jwt_secret: Some("unit-test-secret".to_string()),
            ..ServiceConfig::default()
        }
    }

    async fn store_with_user(active: bool) -> Arc<MemoryRecordStore> {
        let store = MemoryRecordStore::new_shared();
        let now = Utc::now();
        store
            .upsert_user(StoredUser {
                id: "usr_mrios".to_string(),
                user_name: "mrios".to_string(),
                given_name: Some("Miguel".to_string()),
                family_name: Some("Rios".to_string()),
                formatted_name: None,
                active,
                emails: Vec::new(),
                dept: Some("IT".to_string()),
                risk_score: 15,
                password_hash: Some(hash_password("admin_pass").unwrap()),
                created: now,
                last_modified: now,
            })
            .await
            .unwrap();
        store
            .upsert_group(StoredGroup {
                id: "grp_admins".to_string(),
                display_name: "ADMINS".to_string(),
                members: vec![GroupMember {
                    value: "usr_mrios".to_string(),
                    display: Some("mrios".to_string()),
                }],
                created: now,
                last_modified: now,
            })
            .await
            .unwrap();
        store
    }

    fn password_request(username: &str, password: &str) -> TokenRequest {
        TokenRequest {
            grant_type: "password".to_string(),
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            client_id: None,
            client_secret: None,
            scope: Some("read write".to_string()),
        }
    }

    #[tokio::test]
    async fn test_password_grant_round_trip() {
        let service = TokenService::from_config(&test_config(), store_with_user(true).await).unwrap();

        let response = service
            .issue(&password_request("mrios", "admin_pass"))
            .await
            .unwrap();
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 3600);

        let claims = service.validate(&response.access_token).unwrap();
        assert_eq!(claims.sub, "usr_mrios");
        assert_eq!(claims.dept.as_deref(), Some("IT"));
        assert_eq!(claims.risk_score, 15);
        assert!(claims.groups.contains(&"ADMINS".to_string()));
        assert_eq!(claims.exp, claims.iat + 3600);
    }

    #[tokio::test]
    async fn test_wrong_password_is_bad_credentials() {
        let service = TokenService::from_config(&test_config(), store_with_user(true).await).unwrap();
        let err = service
            .issue(&password_request("mrios", "nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::BadCredentials));
    }

    #[tokio::test]
    async fn test_unknown_user_is_bad_credentials() {
        let service = TokenService::from_config(&test_config(), store_with_user(true).await).unwrap();
        let err = service
            .issue(&password_request("ghost", "admin_pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::BadCredentials));
    }

    #[tokio::test]
    async fn test_inactive_user_is_bad_credentials() {
        let service =
            TokenService::from_config(&test_config(), store_with_user(false).await).unwrap();
        let err = service
            .issue(&password_request("mrios", "admin_pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::BadCredentials));
    }

    #[tokio::test]
    async fn test_client_credentials_grant() {
        let service = TokenService::from_config(&test_config(), store_with_user(true).await).unwrap();
        let response = service
            .issue(&TokenRequest {
                grant_type: "client_credentials".to_string(),
                username: None,
                password: None,
                client_id: Some("hr_app".to_string()),
                client_secret: Some("hr_secret_2024".to_string()),
                scope: Some("read hr:payroll".to_string()),
            })
            .await
            .unwrap();

        let claims = service.validate(&response.access_token).unwrap();
        assert_eq!(claims.sub, "hr_app");
        assert_eq!(claims.scope, "read hr:payroll");
        assert!(claims.groups.contains(&"HR_WRITERS".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_grant_type_is_invalid_request() {
        let service = TokenService::from_config(&test_config(), store_with_user(true).await).unwrap();
        let err = service
            .issue(&TokenRequest {
                grant_type: "refresh_token".to_string(),
                username: None,
                password: None,
                client_id: None,
                client_secret: None,
                scope: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let service = TokenService::from_config(&test_config(), store_with_user(true).await).unwrap();

        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "usr_mrios".to_string(),
            scope: "read".to_string(),
            groups: Vec::new(),
            dept: None,
            risk_score: 0,
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret("unit-test-secret".as_bytes()),
        )
        .unwrap();

        let err = service.validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn test_foreign_signature_is_rejected() {
        let service = TokenService::from_config(&test_config(), store_with_user(true).await).unwrap();

        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "usr_mrios".to_string(),
            scope: "read".to_string(),
            groups: Vec::new(),
            dept: None,
            risk_score: 0,
            iat: now,
            exp: now + 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret("some-other-secret".as_bytes()),
        )
        .unwrap();

        let err = service.validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::TokenSignatureInvalid));
    }

    #[tokio::test]
    async fn test_algorithm_mismatch_is_rejected() {
        let service = TokenService::from_config(&test_config(), store_with_user(true).await).unwrap();

        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "usr_mrios".to_string(),
            scope: "read".to_string(),
            groups: Vec::new(),
            dept: None,
            risk_score: 0,
            iat: now,
            exp: now + 3600,
        };
        // signed with HS384 while the service is pinned to HS256
        let token = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret("unit-test-secret".as_bytes()),
        )
        .unwrap();

        let err = service.validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::TokenAlgorithmMismatch));
    }

    #[tokio::test]
    async fn test_garbage_token_is_malformed() {
        let service = TokenService::from_config(&test_config(), store_with_user(true).await).unwrap();
        let err = service.validate("not.a.jwt").unwrap_err();
        assert!(matches!(err, AuthError::TokenMalformed));
    }

    #[test]
    fn test_grant_scopes_intersection() {
        let available = vec![
            "read".to_string(),
            "write".to_string(),
            "hr:payroll".to_string(),
        ];
        assert_eq!(
            grant_scopes(Some("write read"), &available),
            vec!["read", "write"]
        );
        // nothing usable requested: minimum scope applies
        assert_eq!(grant_scopes(Some("admin"), &available), vec!["read"]);
        assert_eq!(grant_scopes(None, &available), vec!["read"]);
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("s3cret").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "s3cret"));
        assert!(!verify_password(&hash, "other"));
        assert!(!verify_password("not-a-phc-string", "s3cret"));
    }
}
