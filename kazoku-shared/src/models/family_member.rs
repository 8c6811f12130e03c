/// Family membership model and lifecycle operations
///
/// FamilyMember is the join entity between users and families and the unit
/// of membership mutation. Rows are never hard-deleted: leaving flips
/// `status` to `left` and stamps `left_at`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE family_members (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     family_id UUID NOT NULL REFERENCES families(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role user_role NOT NULL,
///     status member_status NOT NULL DEFAULT 'active',
///     joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     left_at TIMESTAMPTZ
/// );
///
/// -- one active membership per user, system-wide
/// CREATE UNIQUE INDEX family_members_one_active_idx
///     ON family_members (user_id) WHERE status = 'active';
/// ```
///
/// # Invariants
///
/// - A user holds at most one `active` membership system-wide; the partial
///   unique index backstops what [`join`](FamilyMember::join) checks.
/// - A family never exceeds [`MAX_ACTIVE_MEMBERS`] active members; the
///   join path locks the family row so the count-check and insert act as
///   one atomic unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::family::Family;
use crate::models::user::UserRole;

/// Active-member cap per family
pub const MAX_ACTIVE_MEMBERS: i64 = 10;

/// Membership lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    /// Counted toward the roster and the single-family constraint
    Active,

    /// Soft-deleted; kept for history
    Left,
}

/// Error type for the join operation
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    /// Caller already holds an active membership somewhere
    #[error("Already an active member of a family")]
    AlreadyMember,

    /// No family carries this invite code
    #[error("Invite code is invalid")]
    InvalidCode,

    /// The family is at its active-member cap
    #[error("Family is full")]
    FamilyFull,

    /// Database failure
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Family membership row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FamilyMember {
    /// Row ID
    pub id: Uuid,

    /// Family
    pub family_id: Uuid,

    /// Member
    pub user_id: Uuid,

    /// Role the member holds within the family
    pub role: UserRole,

    /// Lifecycle state
    pub status: MemberStatus,

    /// When the membership began
    pub joined_at: DateTime<Utc>,

    /// When the member left; None while active
    pub left_at: Option<DateTime<Utc>>,
}

/// Input for creating a membership row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFamilyMember {
    /// Family to join
    pub family_id: Uuid,

    /// Joining user
    pub user_id: Uuid,

    /// Role within the family
    pub role: UserRole,
}

/// Roster entry: a membership joined with the member's public user fields
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RosterEntry {
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

impl FamilyMember {
    /// Creates a membership row (status starts as `active`)
    ///
    /// Generic over the executor so family creation and join can insert
    /// inside their transactions.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        data: CreateFamilyMember,
    ) -> Result<Self, sqlx::Error> {
        let member = sqlx::query_as::<_, FamilyMember>(
            r#"
            INSERT INTO family_members (family_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING id, family_id, user_id, role, status, joined_at, left_at
            "#,
        )
        .bind(data.family_id)
        .bind(data.user_id)
        .bind(data.role)
        .fetch_one(executor)
        .await?;

        Ok(member)
    }

    /// Finds a user's active membership in a specific family
    pub async fn find_active(
        pool: &PgPool,
        family_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let member = sqlx::query_as::<_, FamilyMember>(
            r#"
            SELECT id, family_id, user_id, role, status, joined_at, left_at
            FROM family_members
            WHERE family_id = $1 AND user_id = $2 AND status = $3
            "#,
        )
        .bind(family_id)
        .bind(user_id)
        .bind(MemberStatus::Active)
        .fetch_optional(pool)
        .await?;

        Ok(member)
    }

    /// Finds a user's active membership anywhere in the system
    ///
    /// Drives the single-family constraint: at most one row can match.
    pub async fn find_active_for_user<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let member = sqlx::query_as::<_, FamilyMember>(
            r#"
            SELECT id, family_id, user_id, role, status, joined_at, left_at
            FROM family_members
            WHERE user_id = $1 AND status = $2
            "#,
        )
        .bind(user_id)
        .bind(MemberStatus::Active)
        .fetch_optional(executor)
        .await?;

        Ok(member)
    }

    /// Counts a family's active members
    pub async fn count_active<'e>(
        executor: impl PgExecutor<'e>,
        family_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM family_members WHERE family_id = $1 AND status = $2",
        )
        .bind(family_id)
        .bind(MemberStatus::Active)
        .fetch_one(executor)
        .await?;

        Ok(count)
    }

    /// Lists a family's active roster with member display fields
    pub async fn roster(pool: &PgPool, family_id: Uuid) -> Result<Vec<RosterEntry>, sqlx::Error> {
        let entries = sqlx::query_as::<_, RosterEntry>(
            r#"
            SELECT m.id, m.user_id, u.display_name, u.avatar_url, m.role, m.joined_at
            FROM family_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.family_id = $1 AND m.status = $2
            ORDER BY m.joined_at ASC
            "#,
        )
        .bind(family_id)
        .bind(MemberStatus::Active)
        .fetch_all(pool)
        .await?;

        Ok(entries)
    }

    /// Joins a family by invite code as a child member
    ///
    /// The whole sequence — single-family check, family lookup, cap check,
    /// insert — runs in one transaction with the family row locked
    /// (`FOR UPDATE`), so concurrent joins against the same family are
    /// serialized and the cap can never be overshot.
    ///
    /// # Returns
    ///
    /// The joined family and its new active-member count.
    ///
    /// # Errors
    ///
    /// - `JoinError::AlreadyMember`: the caller holds an active membership
    ///   anywhere (independent of which family)
    /// - `JoinError::InvalidCode`: no family carries the code
    /// - `JoinError::FamilyFull`: the family already has
    ///   [`MAX_ACTIVE_MEMBERS`] active members
    pub async fn join(
        pool: &PgPool,
        user_id: Uuid,
        invite_code: &str,
    ) -> Result<(Family, i64), JoinError> {
        let mut tx = pool.begin().await?;

        if Self::find_active_for_user(&mut *tx, user_id).await?.is_some() {
            return Err(JoinError::AlreadyMember);
        }

        let family = sqlx::query_as::<_, Family>(
            r#"
            SELECT id, name, icon_url, invite_code, created_by, created_at
            FROM families
            WHERE invite_code = $1
            FOR UPDATE
            "#,
        )
        .bind(invite_code)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(JoinError::InvalidCode)?;

        let count = Self::count_active(&mut *tx, family.id).await?;
        if count >= MAX_ACTIVE_MEMBERS {
            return Err(JoinError::FamilyFull);
        }

        Self::create(
            &mut *tx,
            CreateFamilyMember {
                family_id: family.id,
                user_id,
                role: UserRole::Child,
            },
        )
        .await?;

        tx.commit().await?;

        Ok((family, count + 1))
    }

    /// Marks a membership as left, stamping `left_at`
    ///
    /// The status guard makes the flip idempotent-safe: an already-left row
    /// is not matched.
    ///
    /// # Returns
    ///
    /// True if an active membership was flipped
    pub async fn mark_left(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE family_members
            SET status = $2, left_at = NOW()
            WHERE id = $1 AND status = $3
            "#,
        )
        .bind(id)
        .bind(MemberStatus::Left)
        .bind(MemberStatus::Active)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_status_serde() {
        assert_eq!(serde_json::to_string(&MemberStatus::Active).unwrap(), "\"active\"");
        assert_eq!(
            serde_json::from_str::<MemberStatus>("\"left\"").unwrap(),
            MemberStatus::Left
        );
    }

    #[test]
    fn test_max_active_members() {
        assert_eq!(MAX_ACTIVE_MEMBERS, 10);
    }

    // Join/leave lifecycle (cap enforcement, single-family constraint,
    // owner protection) is covered by kazoku-api integration tests.
}
