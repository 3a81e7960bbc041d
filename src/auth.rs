use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{ACCESS_TOKEN_TTL_SECS, AppConfig, Env},
    error::{ApiError, ApiResult},
    policy::Actor,
    repository::RepositoryState,
};

/// Claims
///
/// The payload structure carried inside a JSON Web Token. Claims are signed
/// with the server's secret and validated on every authenticated request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the UUID of the user, used to re-fetch the account record
    /// on every request.
    pub sub: Uuid,
    /// Expiration Time (exp): timestamp after which the JWT must not be accepted.
    pub exp: usize,
    /// Issued At (iat): timestamp when the JWT was issued.
    pub iat: usize,
}

/// Signs a fresh access token for the given user.
///
/// Token formats beyond this single access token (refresh rotation,
/// blacklisting, lockout counting) are the concern of the surrounding
/// deployment, not this crate.
pub fn issue_access_token(user_id: Uuid, secret: &str) -> ApiResult<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + ACCESS_TOKEN_TTL_SECS) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("failed to sign access token: {}", e)))
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Handlers take this as a
/// function argument to obtain the caller's ID and staff flag for permission
/// evaluation.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub is_staff: bool,
}

impl AuthUser {
    /// The policy-facing view of this identity.
    pub fn actor(&self) -> Actor {
        Actor::User {
            id: self.id,
            is_staff: self.is_staff,
        }
    }
}

/// AuthUser Extractor Implementation
///
/// Implements Axum's FromRequestParts trait, making AuthUser usable as a
/// function argument in any authenticated handler and keeping authentication
/// separate from business logic.
///
/// The flow:
/// 1. Dependency resolution: Repository and AppConfig from the application state.
/// 2. Local bypass: development-time access using the 'x-user-id' header,
///    guarded by the Env check.
/// 3. Token validation: standard Bearer extraction and JWT decoding.
/// 4. DB lookup: the subject must still exist and be active. This revokes
///    access for accounts deleted or deactivated after the token was issued.
///
/// Rejection: a structured `authentication_failed` response on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        // Local Development Bypass Check
        // In Env::Local, a known user UUID in the 'x-user-id' header authenticates
        // directly. The UUID must still resolve to a live account so the staff
        // flag is loaded correctly.
        if config.env == Env::Local {
            if let Some(user_id_header) = parts.headers.get("x-user-id") {
                if let Ok(id_str) = user_id_header.to_str() {
                    if let Ok(user_id) = Uuid::parse_str(id_str) {
                        if let Ok(Some(user)) = repo.get_user(user_id).await {
                            if user.is_active {
                                return Ok(AuthUser {
                                    id: user.id,
                                    is_staff: user.is_staff,
                                });
                            }
                        }
                    }
                }
            }
        }
        // In Production, or when the bypass did not resolve, fall through to the
        // standard JWT validation flow.

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(unauthorized)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(data) => data,
            Err(e) => {
                return Err(match e.kind() {
                    // The most common failure for a valid-but-old token.
                    ErrorKind::ExpiredSignature => unauthorized(),
                    // Bad signature, malformed token, etc.
                    _ => unauthorized(),
                });
            }
        };

        let user = repo
            .get_user(token_data.claims.sub)
            .await
            .map_err(ApiError::from)?
            .ok_or_else(unauthorized)?;

        if !user.is_active {
            return Err(unauthorized());
        }

        Ok(AuthUser {
            id: user.id,
            is_staff: user.is_staff,
        })
    }
}

fn unauthorized() -> ApiError {
    ApiError::Auth("authentication required".to_string())
}

/// OptionalAuthUser
///
/// Extractor for routes that serve both anonymous and authenticated callers
/// (post listing, detail, comments). A missing or invalid credential resolves
/// to `Actor::Anonymous` instead of rejecting the request; visibility filtering
/// then happens server-side in the query and the policy.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl OptionalAuthUser {
    pub fn actor(&self) -> Actor {
        match &self.0 {
            Some(user) => user.actor(),
            None => Actor::Anonymous,
        }
    }
}

impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuthUser(
            AuthUser::from_request_parts(parts, state).await.ok(),
        ))
    }
}
