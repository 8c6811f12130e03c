/// User profile endpoints
///
/// All routes require a bearer token:
///
/// - `GET /v1/users/me` - profile
/// - `PATCH /v1/users/me` - update display name
/// - `POST /v1/users/me/role` - assign the account role, once
/// - `POST /v1/users/me/device-token` - register a push token
/// - `POST /v1/users/me/avatar` - avatar upload (stub)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use kazoku_shared::{
    auth::middleware::AuthContext,
    models::{
        device_token::{DevicePlatform, DeviceToken},
        user::{PublicUser, User, UserRole},
    },
};
use serde::Deserialize;
use validator::Validate;

/// Profile update request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    /// New display name
    #[validate(length(min = 1, max = 50, message = "Display name must be 1-50 characters"))]
    pub display_name: Option<String>,
}

/// Role assignment request
///
/// `role` is a closed enumeration; anything but "parent"/"child" is
/// rejected during deserialization.
#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    /// The role to assign
    pub role: UserRole,
}

/// Device token registration request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTokenRequest {
    /// Opaque platform push token
    #[validate(length(min = 1, message = "Token must not be empty"))]
    pub token: String,

    /// Platform the token targets
    pub platform: DevicePlatform,
}

/// Returns the caller's profile
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<PublicUser>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(user.into()))
}

/// Updates the caller's profile
pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<PublicUser>> {
    req.validate()?;

    let user = User::update_profile(&state.db, auth.user_id, req.display_name)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(user.into()))
}

/// Assigns the caller's role
///
/// The role is settable exactly once; the guarded UPDATE in the model keeps
/// the rule intact under concurrent requests.
///
/// # Errors
///
/// - `409 ROLE_ALREADY_SET`: the caller already picked a role
pub async fn set_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<SetRoleRequest>,
) -> ApiResult<Json<PublicUser>> {
    let current = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if current.role.is_some() {
        return Err(ApiError::RoleAlreadySet);
    }

    // None here means a concurrent request won the one-shot assignment
    let user = User::set_role(&state.db, auth.user_id, req.role)
        .await?
        .ok_or(ApiError::RoleAlreadySet)?;

    Ok(Json(user.into()))
}

/// Registers a device push token for the caller
///
/// Upserts on (user, token); re-registering refreshes the platform. Push
/// delivery itself is out of scope.
pub async fn register_device_token(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<DeviceTokenRequest>,
) -> ApiResult<StatusCode> {
    req.validate()?;

    DeviceToken::upsert(&state.db, auth.user_id, &req.token, req.platform).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Avatar upload stub
///
/// # Errors
///
/// Always `501 NOT_IMPLEMENTED` until file storage lands.
pub async fn upload_avatar(
    Extension(_auth): Extension<AuthContext>,
) -> ApiResult<StatusCode> {
    Err(ApiError::NotImplemented)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_role_request_is_closed_enum() {
        let req: SetRoleRequest = serde_json::from_str(r#"{"role": "parent"}"#).unwrap();
        assert_eq!(req.role, UserRole::Parent);

        assert!(serde_json::from_str::<SetRoleRequest>(r#"{"role": "admin"}"#).is_err());
    }

    #[test]
    fn test_device_token_request_platform_is_closed_enum() {
        let req: DeviceTokenRequest =
            serde_json::from_str(r#"{"token": "abc", "platform": "ios"}"#).unwrap();
        assert_eq!(req.platform, DevicePlatform::Ios);

        assert!(
            serde_json::from_str::<DeviceTokenRequest>(r#"{"token": "abc", "platform": "web"}"#)
                .is_err()
        );
    }

    #[test]
    fn test_update_profile_length_bounds() {
        let req = UpdateProfileRequest {
            display_name: Some("x".repeat(51)),
        };
        assert!(req.validate().is_err());

        let req = UpdateProfileRequest {
            display_name: Some("Hanako".to_string()),
        };
        assert!(req.validate().is_ok());
    }
}
