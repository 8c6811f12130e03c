/// Family endpoints
///
/// All routes require a bearer token; several are role-gated:
///
/// - `POST /v1/families` - create a family (parent only)
/// - `GET /v1/families` - families the caller actively belongs to
/// - `GET /v1/families/:family_id` - detail with roster (members only)
/// - `GET /v1/families/:family_id/members` - roster (members only)
/// - `GET /v1/families/:family_id/invite-code` - fetch code (active parent)
/// - `POST /v1/families/:family_id/invite-code` - regenerate (active parent)
/// - `POST /v1/families/join` - join by invite code (child only)
/// - `POST /v1/families/:family_id/leave` - leave (owner protected)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use kazoku_shared::{
    auth::middleware::AuthContext,
    models::{
        family::{Family, FamilySummary},
        family_member::{FamilyMember, RosterEntry},
        user::UserRole,
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Create family request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateFamilyRequest {
    /// Family name
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: String,
}

/// Join family request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinFamilyRequest {
    /// The invite code shared by a parent
    #[validate(length(min = 1, message = "Invite code must not be empty"))]
    pub invite_code: String,
}

/// Family payload with its live member count
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyResponse {
    /// Family ID
    pub id: Uuid,

    /// Family name
    pub name: String,

    /// Icon URL, if set
    pub icon_url: Option<String>,

    /// Owning user
    pub created_by: Uuid,

    /// Number of active members
    pub member_count: i64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl FamilyResponse {
    fn new(family: Family, member_count: i64) -> Self {
        Self {
            id: family.id,
            name: family.name,
            icon_url: family.icon_url,
            created_by: family.created_by,
            member_count,
            created_at: family.created_at,
        }
    }
}

impl From<FamilySummary> for FamilyResponse {
    fn from(summary: FamilySummary) -> Self {
        Self {
            id: summary.id,
            name: summary.name,
            icon_url: summary.icon_url,
            created_by: summary.created_by,
            member_count: summary.member_count,
            created_at: summary.created_at,
        }
    }
}

/// Roster entry payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    /// Membership row ID
    pub id: Uuid,

    /// Member's user ID
    pub user_id: Uuid,

    /// Member's display name
    pub display_name: String,

    /// Member's avatar URL, if set
    pub avatar_url: Option<String>,

    /// Role within the family
    pub role: UserRole,

    /// When the membership began
    pub joined_at: DateTime<Utc>,
}

impl From<RosterEntry> for MemberResponse {
    fn from(entry: RosterEntry) -> Self {
        Self {
            id: entry.id,
            user_id: entry.user_id,
            display_name: entry.display_name,
            avatar_url: entry.avatar_url,
            role: entry.role,
            joined_at: entry.joined_at,
        }
    }
}

/// Family detail payload: family plus roster
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyDetailResponse {
    /// Family ID
    pub id: Uuid,

    /// Family name
    pub name: String,

    /// Icon URL, if set
    pub icon_url: Option<String>,

    /// Owning user
    pub created_by: Uuid,

    /// Number of active members
    pub member_count: i64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Active roster
    pub members: Vec<MemberResponse>,
}

/// Invite code payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteCodeResponse {
    /// The invite code
    pub code: String,

    /// Shareable join URL
    pub url: String,

    /// Invite codes do not expire
    pub expires_at: Option<DateTime<Utc>>,
}

/// Requires the caller to hold an active membership in the family
async fn require_active_membership(
    state: &AppState,
    family_id: Uuid,
    user_id: Uuid,
) -> ApiResult<FamilyMember> {
    FamilyMember::find_active(&state.db, family_id, user_id)
        .await?
        .ok_or(ApiError::Forbidden)
}

/// Requires the caller to hold an active *parent* membership in the family
async fn require_active_parent(
    state: &AppState,
    family_id: Uuid,
    user_id: Uuid,
) -> ApiResult<FamilyMember> {
    let membership = require_active_membership(state, family_id, user_id).await?;
    if membership.role != UserRole::Parent {
        return Err(ApiError::Forbidden);
    }
    Ok(membership)
}

/// Creates a family (parent only)
///
/// The family and the owner's parent membership are created in one atomic
/// unit; the owner joins with role parent and status active.
///
/// # Errors
///
/// - `403 ROLE_REQUIRED` / `403 FORBIDDEN`: caller has no role / is a child
/// - `409 ALREADY_MEMBER`: owner already holds an active membership
pub async fn create_family(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateFamilyRequest>,
) -> ApiResult<(StatusCode, Json<FamilyResponse>)> {
    auth.require_role(UserRole::Parent)?;
    req.validate()?;

    let family = Family::create_with_owner(&state.db, &req.name, auth.user_id).await?;

    tracing::info!(family_id = %family.id, owner = %auth.user_id, "Family created");

    Ok((
        StatusCode::CREATED,
        Json(FamilyResponse::new(family, 1)),
    ))
}

/// Lists the families the caller actively belongs to
pub async fn list_families(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<FamilyResponse>>> {
    let families = Family::list_for_user(&state.db, auth.user_id).await?;

    Ok(Json(families.into_iter().map(Into::into).collect()))
}

/// Family detail with the active roster (members only)
pub async fn get_family(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(family_id): Path<Uuid>,
) -> ApiResult<Json<FamilyDetailResponse>> {
    require_active_membership(&state, family_id, auth.user_id).await?;

    let family = Family::find_by_id(&state.db, family_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let roster = FamilyMember::roster(&state.db, family_id).await?;

    Ok(Json(FamilyDetailResponse {
        id: family.id,
        name: family.name,
        icon_url: family.icon_url,
        created_by: family.created_by,
        member_count: roster.len() as i64,
        created_at: family.created_at,
        members: roster.into_iter().map(Into::into).collect(),
    }))
}

/// Active roster of a family (members only)
///
/// Reward/title aggregation is deliberately absent from the roster payload.
pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(family_id): Path<Uuid>,
) -> ApiResult<Json<Vec<MemberResponse>>> {
    require_active_membership(&state, family_id, auth.user_id).await?;

    let roster = FamilyMember::roster(&state.db, family_id).await?;

    Ok(Json(roster.into_iter().map(Into::into).collect()))
}

/// Fetches the family's invite code (active parent only)
pub async fn get_invite_code(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(family_id): Path<Uuid>,
) -> ApiResult<Json<InviteCodeResponse>> {
    auth.require_role(UserRole::Parent)?;
    require_active_parent(&state, family_id, auth.user_id).await?;

    let family = Family::find_by_id(&state.db, family_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(InviteCodeResponse {
        url: state.config.invite_url(&family.invite_code),
        code: family.invite_code,
        expires_at: None,
    }))
}

/// Regenerates the family's invite code (active parent only)
///
/// The old code stops admitting members the moment the new one is written.
pub async fn regenerate_invite_code(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(family_id): Path<Uuid>,
) -> ApiResult<Json<InviteCodeResponse>> {
    auth.require_role(UserRole::Parent)?;
    require_active_parent(&state, family_id, auth.user_id).await?;

    let family = Family::regenerate_invite_code(&state.db, family_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    tracing::info!(family_id = %family.id, "Invite code regenerated");

    Ok(Json(InviteCodeResponse {
        url: state.config.invite_url(&family.invite_code),
        code: family.invite_code,
        expires_at: None,
    }))
}

/// Joins a family by invite code (child only)
///
/// # Errors
///
/// - `409 ALREADY_MEMBER`: caller already actively belongs to a family
/// - `404 INVALID_CODE`: no family carries the code
/// - `400 FAMILY_FULL`: the family is at 10 active members
pub async fn join_family(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<JoinFamilyRequest>,
) -> ApiResult<Json<FamilyResponse>> {
    auth.require_role(UserRole::Child)?;
    req.validate()?;

    let (family, member_count) =
        FamilyMember::join(&state.db, auth.user_id, &req.invite_code).await?;

    tracing::info!(family_id = %family.id, user_id = %auth.user_id, "Member joined");

    Ok(Json(FamilyResponse::new(family, member_count)))
}

/// Leaves a family
///
/// The membership row is kept and flipped to `left` with a timestamp.
///
/// # Errors
///
/// - `404 NOT_MEMBER`: no active membership in this family
/// - `400 CANNOT_LEAVE`: the caller owns the family
pub async fn leave_family(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(family_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let membership = FamilyMember::find_active(&state.db, family_id, auth.user_id)
        .await?
        .ok_or(ApiError::NotMember)?;

    let family = Family::find_by_id(&state.db, family_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if family.created_by == auth.user_id {
        return Err(ApiError::CannotLeave);
    }

    FamilyMember::mark_left(&state.db, membership.id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_response_wire_shape() {
        let family = Family {
            id: Uuid::new_v4(),
            name: "Smith".to_string(),
            icon_url: None,
            invite_code: "ABCDEF".to_string(),
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(FamilyResponse::new(family, 2)).unwrap();
        assert_eq!(json["memberCount"], 2);
        assert_eq!(json["name"], "Smith");
        // The invite code is only exposed through the invite-code endpoints
        assert!(json.get("inviteCode").is_none());
    }

    #[test]
    fn test_invite_code_response_never_expires() {
        let response = InviteCodeResponse {
            code: "ABCDEF".to_string(),
            url: "https://kazoku.app/join/ABCDEF".to_string(),
            expires_at: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json["expiresAt"].is_null());
        assert_eq!(json["url"], "https://kazoku.app/join/ABCDEF");
    }

    #[test]
    fn test_join_request_camel_case() {
        let req: JoinFamilyRequest =
            serde_json::from_str(r#"{"inviteCode": "ABCDEF"}"#).unwrap();
        assert_eq!(req.invite_code, "ABCDEF");
    }
}
