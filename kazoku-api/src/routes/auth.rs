/// Authentication endpoints
///
/// The full identity lifecycle:
///
/// - `POST /v1/auth/send-code` - issue a verification code for a phone/email
/// - `POST /v1/auth/verify-code` - consume a code; logs in existing users,
///   signals registration for unknown targets
/// - `POST /v1/auth/register` - create an account after verification
/// - `POST /v1/auth/login` - email/password login
/// - `POST /v1/auth/refresh` - rotate a refresh token for a new pair
/// - `POST /v1/auth/logout` - revoke all sessions (bearer)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use kazoku_shared::{
    auth::{middleware::AuthContext, password, tokens, tokens::TokenPair},
    models::{
        user::{CreateUser, PublicUser, User},
        verification::{VerificationCode, VerificationType, RETRY_AFTER_SECS},
    },
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Resolves the (target, type) pair from optional phone/email fields
///
/// Phone takes precedence when both are supplied; supplying neither is a
/// validation failure.
fn resolve_target(
    phone_number: &Option<String>,
    email: &Option<String>,
) -> ApiResult<(String, VerificationType)> {
    if let Some(phone) = phone_number.as_deref().filter(|p| !p.is_empty()) {
        return Ok((phone.to_string(), VerificationType::Phone));
    }
    if let Some(email) = email.as_deref().filter(|e| !e.is_empty()) {
        return Ok((email.to_string(), VerificationType::Email));
    }
    Err(ApiError::ValidationError(
        "A phone number or email address is required".to_string(),
    ))
}

/// Looks up a user by verification target
async fn find_user_by_target(
    state: &AppState,
    target: &str,
    kind: VerificationType,
) -> Result<Option<User>, sqlx::Error> {
    match kind {
        VerificationType::Phone => User::find_by_phone(&state.db, target).await,
        VerificationType::Email => User::find_by_email(&state.db, target).await,
    }
}

/// Tokens-plus-user payload returned by every successful auth flow
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Access token (15 minutes)
    pub access_token: String,

    /// Refresh token (30 days, single-use)
    pub refresh_token: String,

    /// Access token lifetime in seconds
    pub expires_in: u64,

    /// The authenticated user
    pub user: PublicUser,
}

impl AuthResponse {
    fn new(pair: TokenPair, user: User) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
            user: user.into(),
        }
    }
}

/// Send-code request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeRequest {
    /// Phone number to verify
    pub phone_number: Option<String>,

    /// Email address to verify
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

/// Send-code response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeResponse {
    /// When the issued code expires
    pub expires_at: DateTime<Utc>,

    /// Seconds the client should wait before requesting another code
    pub retry_after: u64,
}

/// Issues a verification code for a phone number or email address
///
/// Any prior unused code for the same target is invalidated; only the
/// newest code is consumable. Delivery runs through the notification
/// collaborator, whose failure is logged but never surfaced — the response
/// is the same either way.
///
/// # Errors
///
/// - `400 VALIDATION_ERROR`: neither phone nor email supplied
pub async fn send_code(
    State(state): State<AppState>,
    Json(req): Json<SendCodeRequest>,
) -> ApiResult<Json<SendCodeResponse>> {
    req.validate()?;
    let (target, kind) = resolve_target(&req.phone_number, &req.email)?;

    let code = VerificationCode::issue(&state.db, &target, kind).await?;

    if let Err(e) = state
        .notifier
        .send_verification_code(&target, kind, &code.code)
        .await
    {
        tracing::warn!(target_id = %target, "Verification code delivery failed: {}", e);
    }

    Ok(Json(SendCodeResponse {
        expires_at: code.expires_at,
        retry_after: RETRY_AFTER_SECS,
    }))
}

/// Verify-code request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeRequest {
    /// Phone number the code was sent to
    pub phone_number: Option<String>,

    /// Email address the code was sent to
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    /// The code to consume
    #[validate(length(min = 4, max = 6, message = "Code must be 4-6 digits"))]
    pub code: String,
}

/// Verify-code response: token issuance for existing users, a new-user
/// signal otherwise
///
/// Callers must handle both shapes; they are distinguished by the
/// `isNewUser` marker.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum VerifyCodeResponse {
    /// Existing account: login semantics
    Tokens(Box<AuthResponse>),

    /// Unknown target: proceed to registration
    #[serde(rename_all = "camelCase")]
    NewUser {
        /// Always true
        is_new_user: bool,

        /// Hint for the client
        message: String,
    },
}

/// Consumes a verification code
///
/// On success the code is marked used (single consumption). If a user
/// already exists for the target, a token pair is issued; otherwise the
/// caller is directed to registration.
///
/// # Errors
///
/// - `401 INVALID_CODE`: no live code matches (not found, expired, and
///   already-used are indistinguishable)
pub async fn verify_code(
    State(state): State<AppState>,
    Json(req): Json<VerifyCodeRequest>,
) -> ApiResult<Json<VerifyCodeResponse>> {
    req.validate()?;
    let (target, kind) = resolve_target(&req.phone_number, &req.email)?;

    VerificationCode::consume(&state.db, &target, &req.code)
        .await?
        .ok_or(ApiError::InvalidCode)?;

    match find_user_by_target(&state, &target, kind).await? {
        Some(user) => {
            let pair = tokens::issue_pair(&state.db, state.jwt_secret(), user.id).await?;
            Ok(Json(VerifyCodeResponse::Tokens(Box::new(
                AuthResponse::new(pair, user),
            ))))
        }
        None => Ok(Json(VerifyCodeResponse::NewUser {
            is_new_user: true,
            message: "Registration required".to_string(),
        })),
    }
}

/// Register request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Phone number (at least one of phone/email)
    pub phone_number: Option<String>,

    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    /// Optional password; phone-only accounts may omit it
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,

    /// Display name
    #[validate(length(min = 1, max = 50, message = "Display name must be 1-50 characters"))]
    pub display_name: String,

    /// The code consumed via verify-code
    #[validate(length(min = 4, max = 6, message = "Code must be 4-6 digits"))]
    pub verification_code: String,
}

/// Registers a new account after verification
///
/// Requires that the supplied code was consumed through verify-code within
/// the last 10 minutes. The account starts with no role.
///
/// # Errors
///
/// - `400 INVALID_VERIFICATION`: code was never consumed or the window
///   elapsed
/// - `409 USER_EXISTS`: an account already matches the target
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;
    let (target, kind) = resolve_target(&req.phone_number, &req.email)?;

    let verified =
        VerificationCode::was_recently_consumed(&state.db, &target, &req.verification_code)
            .await?;
    if !verified {
        return Err(ApiError::InvalidVerification);
    }

    if find_user_by_target(&state, &target, kind).await?.is_some() {
        return Err(ApiError::UserExists);
    }

    let password_hash = match req.password.as_deref() {
        Some(password) => Some(password::hash_password(password)?),
        None => None,
    };

    let user = User::create(
        &state.db,
        CreateUser {
            phone_number: req.phone_number.clone(),
            email: req.email.clone(),
            password_hash,
            display_name: req.display_name.clone(),
        },
    )
    .await?;

    let pair = tokens::issue_pair(&state.db, state.jwt_secret(), user.id).await?;

    tracing::info!(user_id = %user.id, "New account registered");

    Ok((StatusCode::CREATED, Json(AuthResponse::new(pair, user))))
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password
    pub password: String,
}

/// Email/password login
///
/// # Errors
///
/// - `401 INVALID_CREDENTIALS`: unknown email, an account with no password,
///   or a wrong password — the three cases are indistinguishable so the
///   endpoint never confirms account existence
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    let hash = user
        .password_hash
        .as_deref()
        .ok_or(ApiError::InvalidCredentials)?;

    if !password::verify_password(&req.password, hash)? {
        return Err(ApiError::InvalidCredentials);
    }

    let pair = tokens::issue_pair(&state.db, state.jwt_secret(), user.id).await?;

    Ok(Json(AuthResponse::new(pair, user)))
}

/// Refresh request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// The refresh token to rotate
    pub refresh_token: Option<String>,
}

/// Rotates a refresh token for a new token pair
///
/// Rotation is single-use: the presented token is deleted in the same
/// transaction that persists its replacement, so presenting it a second
/// time fails.
///
/// # Errors
///
/// - `400 MISSING_TOKEN`: no refresh token in the request
/// - `401 INVALID_TOKEN`: token unknown, already rotated, or expired
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let token = req
        .refresh_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::MissingToken)?;

    let (pair, user_id) = tokens::rotate(&state.db, state.jwt_secret(), token).await?;

    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(AuthResponse::new(pair, user)))
}

/// Logs out: revokes every refresh token for the caller
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<StatusCode> {
    let revoked = tokens::revoke_all(&state.db, auth.user_id).await?;
    tracing::debug!(user_id = %auth.user_id, revoked, "Sessions revoked");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            phone_number: Some("+819000000001".to_string()),
            email: None,
            password_hash: None,
            display_name: "Hanako".to_string(),
            avatar_url: None,
            role: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_resolve_target_prefers_phone() {
        let (target, kind) = resolve_target(
            &Some("+819000000001".to_string()),
            &Some("a@example.com".to_string()),
        )
        .unwrap();
        assert_eq!(target, "+819000000001");
        assert_eq!(kind, VerificationType::Phone);
    }

    #[test]
    fn test_resolve_target_email_fallback() {
        let (target, kind) = resolve_target(&None, &Some("a@example.com".to_string())).unwrap();
        assert_eq!(target, "a@example.com");
        assert_eq!(kind, VerificationType::Email);
    }

    #[test]
    fn test_resolve_target_requires_one() {
        assert!(resolve_target(&None, &None).is_err());
        assert!(resolve_target(&Some(String::new()), &None).is_err());
    }

    #[test]
    fn test_verify_response_new_user_shape() {
        let response = VerifyCodeResponse::NewUser {
            is_new_user: true,
            message: "Registration required".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["isNewUser"], true);
        assert!(json.get("accessToken").is_none());
    }

    #[test]
    fn test_verify_response_tokens_shape() {
        let response = VerifyCodeResponse::Tokens(Box::new(AuthResponse {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_in: 900,
            user: sample_user().into(),
        }));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["expiresIn"], 900);
        assert!(json.get("isNewUser").is_none());
        assert_eq!(json["user"]["displayName"], "Hanako");
    }

    #[test]
    fn test_register_request_camel_case_and_optional_password() {
        // camelCase contract: verificationCode, displayName
        let req: RegisterRequest = serde_json::from_str(
            r#"{"phoneNumber": "+819000000001", "displayName": "Hanako", "verificationCode": "123456"}"#,
        )
        .unwrap();
        assert!(req.validate().is_ok());
        assert!(req.password.is_none());
    }
}
