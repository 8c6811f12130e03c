/// Bearer-token authentication guard
///
/// Every protected request passes through [`authenticate`]: the bearer
/// token is extracted from the `Authorization` header, validated as an
/// access token, and resolved to a live user row. The resulting
/// [`AuthContext`] (user ID plus optional role) is inserted into request
/// extensions for handlers to extract.
///
/// Failure is terminal for the request:
/// - missing/malformed header → `MissingCredentials`
/// - valid signature, past expiry → `TokenExpired`
/// - anything else wrong with the token → `InvalidToken`
/// - token subject no longer exists → `UserNotFound`
///
/// A secondary gate, [`AuthContext::require_role`], enforces role-gated
/// operations: `RoleRequired` when the caller never picked a role,
/// `Forbidden` on a mismatch.
///
/// # Example
///
/// ```no_run
/// use axum::Extension;
/// use kazoku_shared::auth::middleware::AuthContext;
/// use kazoku_shared::models::user::UserRole;
///
/// async fn create_family(Extension(auth): Extension<AuthContext>) -> Result<String, String> {
///     auth.require_role(UserRole::Parent).map_err(|e| e.to_string())?;
///     Ok(format!("parent {}", auth.user_id))
/// }
/// ```

use axum::{extract::Request, http::header, middleware::Next, response::Response};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::jwt::{validate_access_token, JwtError};
use crate::models::user::{User, UserRole};

/// Authentication context added to request extensions
///
/// Present on every request that passed the guard. Handlers extract it with
/// axum's `Extension` extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: Uuid,

    /// The user's role; None until assigned via the role operation
    pub role: Option<UserRole>,
}

impl AuthContext {
    /// Enforces an exact role match
    ///
    /// # Errors
    ///
    /// `AuthError::RoleRequired` if the caller has no role set,
    /// `AuthError::Forbidden` if the role differs from `expected`.
    pub fn require_role(&self, expected: UserRole) -> Result<(), AuthError> {
        match self.role {
            None => Err(AuthError::RoleRequired),
            Some(role) if role != expected => Err(AuthError::Forbidden),
            Some(_) => Ok(()),
        }
    }
}

/// Error type for the authentication guard
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing or malformed Authorization header
    #[error("Authentication required")]
    MissingCredentials,

    /// Access token signature is valid but the token has expired
    #[error("Token has expired")]
    TokenExpired,

    /// Token is malformed, mis-signed, or not an access token
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token subject no longer resolves to a user
    #[error("User not found")]
    UserNotFound,

    /// Caller has not set a role yet
    #[error("A role must be set before this operation")]
    RoleRequired,

    /// Caller's role does not permit this operation
    #[error("This operation is not permitted")]
    Forbidden,

    /// Database failure during user resolution
    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Bearer authentication middleware
///
/// Validates the `Authorization: Bearer <token>` header, resolves the user,
/// and adds an [`AuthContext`] to the request extensions.
///
/// # Errors
///
/// See the module docs for the failure taxonomy. The caller (the API
/// crate's router layer) converts `AuthError` into its HTTP error type.
pub async fn authenticate(
    pool: &PgPool,
    secret: &str,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MissingCredentials)?;

    let claims = validate_access_token(token, secret).map_err(|e| match e {
        JwtError::Expired => AuthError::TokenExpired,
        other => AuthError::InvalidToken(other.to_string()),
    })?;

    // Re-resolve the user so deleted accounts and freshly assigned roles
    // are reflected immediately, not at next token issuance.
    let user = User::find_by_id(pool, claims.sub)
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?
        .ok_or(AuthError::UserNotFound)?;

    let auth_context = AuthContext {
        user_id: user.id,
        role: user.role,
    };
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(role: Option<UserRole>) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn test_require_role_exact_match() {
        assert!(context(Some(UserRole::Parent))
            .require_role(UserRole::Parent)
            .is_ok());
        assert!(context(Some(UserRole::Child))
            .require_role(UserRole::Child)
            .is_ok());
    }

    #[test]
    fn test_require_role_mismatch_is_forbidden() {
        let result = context(Some(UserRole::Child)).require_role(UserRole::Parent);
        assert!(matches!(result, Err(AuthError::Forbidden)));
    }

    #[test]
    fn test_require_role_unset_is_role_required() {
        let result = context(None).require_role(UserRole::Parent);
        assert!(matches!(result, Err(AuthError::RoleRequired)));
    }
}
