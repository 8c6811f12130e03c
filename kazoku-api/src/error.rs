/// Error handling for the API server
///
/// All handlers return `Result<T, ApiError>`. Every domain failure is an
/// explicit `ApiError` variant carrying an HTTP status and a stable
/// machine-readable code; the mapping lives in one lookup
/// ([`ApiError::parts`]) rather than scattered conditionals. Unexpected
/// failures are logged and collapsed to a generic `INTERNAL_ERROR` without
/// leaking internals.
///
/// # Wire shape
///
/// ```json
/// { "error": { "code": "INVALID_CODE", "message": "Verification code is invalid" } }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use kazoku_shared::auth::{
    jwt::JwtError, middleware::AuthError, password::PasswordError, tokens::TokenError,
};
use kazoku_shared::models::family_member::JoinError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
///
/// One variant per client-facing error code; see [`ApiError::parts`] for
/// the status/code table.
#[derive(Debug)]
pub enum ApiError {
    /// Missing/invalid credentials, or the token's user no longer exists (401)
    Unauthorized,

    /// Access token signature is valid but expired (401)
    TokenExpired,

    /// Malformed, mis-signed, or already-rotated token (401)
    InvalidToken,

    /// Email/password pair doesn't match any account (401)
    InvalidCredentials,

    /// Verification code not found, expired, or already used (401)
    InvalidCode,

    /// Refresh request without a refresh token (400)
    MissingToken,

    /// Registration attempted without a recently consumed code (400)
    InvalidVerification,

    /// Caller must pick a role before this operation (403)
    RoleRequired,

    /// Caller's role or membership doesn't permit this operation (403)
    Forbidden,

    /// Resource doesn't exist (404)
    NotFound,

    /// No invite code matches (404, code INVALID_CODE)
    InvalidInviteCode,

    /// Caller holds no active membership in this family (404)
    NotMember,

    /// Account already exists for this phone/email (409)
    UserExists,

    /// Caller already holds an active family membership (409)
    AlreadyMember,

    /// Role was already assigned; it is settable exactly once (409)
    RoleAlreadySet,

    /// Family is at its active-member cap (400)
    FamilyFull,

    /// The family owner cannot leave (400)
    CannotLeave,

    /// Request failed structured validation (400)
    ValidationError(String),

    /// Endpoint is a stub (501)
    NotImplemented,

    /// Unexpected failure; detail is logged, not returned (500)
    InternalError(String),
}

/// Error body carried inside the response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable code (e.g., "INVALID_CODE")
    pub code: String,

    /// Human-readable message
    pub message: String,
}

/// Error response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// The error payload
    pub error: ErrorBody,
}

impl ApiError {
    /// The single status/code/message lookup for every variant
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            ApiError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_EXPIRED",
                "Token has expired".to_string(),
            ),
            ApiError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "INVALID_TOKEN",
                "Token is invalid".to_string(),
            ),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Email or password is incorrect".to_string(),
            ),
            ApiError::InvalidCode => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CODE",
                "Verification code is invalid".to_string(),
            ),
            ApiError::MissingToken => (
                StatusCode::BAD_REQUEST,
                "MISSING_TOKEN",
                "A refresh token is required".to_string(),
            ),
            ApiError::InvalidVerification => (
                StatusCode::BAD_REQUEST,
                "INVALID_VERIFICATION",
                "Verification is invalid; please verify again".to_string(),
            ),
            ApiError::RoleRequired => (
                StatusCode::FORBIDDEN,
                "ROLE_REQUIRED",
                "A role must be set before this operation".to_string(),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "This operation is not permitted".to_string(),
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Resource not found".to_string(),
            ),
            ApiError::InvalidInviteCode => (
                StatusCode::NOT_FOUND,
                "INVALID_CODE",
                "Invite code is invalid".to_string(),
            ),
            ApiError::NotMember => (
                StatusCode::NOT_FOUND,
                "NOT_MEMBER",
                "Not a member of this family".to_string(),
            ),
            ApiError::UserExists => (
                StatusCode::CONFLICT,
                "USER_EXISTS",
                "This account is already registered".to_string(),
            ),
            ApiError::AlreadyMember => (
                StatusCode::CONFLICT,
                "ALREADY_MEMBER",
                "Already a member of another family".to_string(),
            ),
            ApiError::RoleAlreadySet => (
                StatusCode::CONFLICT,
                "ROLE_ALREADY_SET",
                "Role has already been set".to_string(),
            ),
            ApiError::FamilyFull => (
                StatusCode::BAD_REQUEST,
                "FAMILY_FULL",
                "This family is full".to_string(),
            ),
            ApiError::CannotLeave => (
                StatusCode::BAD_REQUEST,
                "CANNOT_LEAVE",
                "The family owner cannot leave".to_string(),
            ),
            ApiError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
            ),
            ApiError::NotImplemented => (
                StatusCode::NOT_IMPLEMENTED,
                "NOT_IMPLEMENTED",
                "This feature is not implemented yet".to_string(),
            ),
            ApiError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An unexpected error occurred".to_string(),
            ),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (_, code, message) = self.parts();
        write!(f, "{}: {}", code, message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Internal detail goes to the log, never to the client
        if let ApiError::InternalError(detail) = &self {
            tracing::error!("Internal error: {}", detail);
        }

        let (status, code, message) = self.parts();

        let body = Json(ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}

/// Convert sqlx errors to API errors
///
/// Unique-constraint violations carry domain meaning: a duplicate
/// phone/email is `USER_EXISTS`, a second active membership is
/// `ALREADY_MEMBER`. Everything else is internal.
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound,
            sqlx::Error::Database(db_err) => {
                if let Some(constraint) = db_err.constraint() {
                    if constraint.contains("phone_number") || constraint.contains("email") {
                        return ApiError::UserExists;
                    }
                    if constraint.contains("one_active") {
                        return ApiError::AlreadyMember;
                    }
                }
                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert authentication guard errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials | AuthError::UserNotFound => ApiError::Unauthorized,
            AuthError::TokenExpired => ApiError::TokenExpired,
            AuthError::InvalidToken(_) => ApiError::InvalidToken,
            AuthError::RoleRequired => ApiError::RoleRequired,
            AuthError::Forbidden => ApiError::Forbidden,
            AuthError::DatabaseError(msg) => ApiError::InternalError(msg),
        }
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::TokenExpired,
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
            JwtError::ValidationError(_) => ApiError::InvalidToken,
        }
    }
}

/// Convert token-pair errors to API errors
impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidRefreshToken => ApiError::InvalidToken,
            TokenError::Jwt(e) => e.into(),
            TokenError::Database(e) => e.into(),
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert join errors to API errors
impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        match err {
            JoinError::AlreadyMember => ApiError::AlreadyMember,
            JoinError::InvalidCode => ApiError::InvalidInviteCode,
            JoinError::FamilyFull => ApiError::FamilyFull,
            JoinError::Database(e) => e.into(),
        }
    }
}

/// Convert structured validation failures to API errors
///
/// Reported as a single VALIDATION_ERROR; per-field detail stays server-side.
impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        tracing::debug!("Request validation failed: {}", err);
        ApiError::ValidationError("Request validation failed".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Unauthorized.parts().0, StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::TokenExpired.parts().0, StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidCode.parts().0, StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidVerification.parts().0, StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::RoleRequired.parts().0, StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotMember.parts().0, StatusCode::NOT_FOUND);
        assert_eq!(ApiError::UserExists.parts().0, StatusCode::CONFLICT);
        assert_eq!(ApiError::AlreadyMember.parts().0, StatusCode::CONFLICT);
        assert_eq!(ApiError::FamilyFull.parts().0, StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::CannotLeave.parts().0, StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::NotImplemented.parts().0,
            StatusCode::NOT_IMPLEMENTED
        );
    }

    #[test]
    fn test_invite_code_shares_code_with_verification_code() {
        // Same stable code, different statuses: 401 for verification codes,
        // 404 for invite codes.
        let (status, code, _) = ApiError::InvalidCode.parts();
        assert_eq!((status, code), (StatusCode::UNAUTHORIZED, "INVALID_CODE"));

        let (status, code, _) = ApiError::InvalidInviteCode.parts();
        assert_eq!((status, code), (StatusCode::NOT_FOUND, "INVALID_CODE"));
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let err = ApiError::InternalError("connection pool exhausted".to_string());
        let (_, _, message) = err.parts();
        assert!(!message.contains("pool"));
    }

    #[test]
    fn test_auth_error_conversion() {
        assert!(matches!(
            ApiError::from(AuthError::MissingCredentials),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from(AuthError::TokenExpired),
            ApiError::TokenExpired
        ));
        assert!(matches!(
            ApiError::from(AuthError::RoleRequired),
            ApiError::RoleRequired
        ));
        assert!(matches!(
            ApiError::from(AuthError::Forbidden),
            ApiError::Forbidden
        ));
    }

    #[test]
    fn test_display() {
        let err = ApiError::FamilyFull;
        assert_eq!(err.to_string(), "FAMILY_FULL: This family is full");
    }
}
