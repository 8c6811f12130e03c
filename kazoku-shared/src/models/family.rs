/// Family model and database operations
///
/// A family is a small group owned by the parent who created it. Each
/// family carries a unique invite code that admits child-role users; the
/// code can be regenerated by any active parent of the family.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE families (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(50) NOT NULL,
///     icon_url VARCHAR(512),
///     invite_code VARCHAR(6) NOT NULL UNIQUE,
///     created_by UUID NOT NULL REFERENCES users(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Invite codes
///
/// Codes are 6 uppercase hex characters derived from 3 random bytes. 48
/// bits of entropy makes collisions negligible but not impossible, so the
/// generator does NOT guarantee uniqueness: the unique constraint is the
/// source of truth, and creation/regeneration retry generation once on a
/// conflict before giving up.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::family_member::{CreateFamilyMember, FamilyMember, MemberStatus};
use crate::models::user::UserRole;

/// Generates a random invite code: 3 random bytes as 6 uppercase hex chars
pub fn generate_invite_code() -> String {
    let mut bytes = [0u8; 3];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode_upper(bytes)
}

/// Returns true when the error is a unique violation on the given constraint
pub(crate) fn is_unique_violation(err: &sqlx::Error, constraint_part: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .constraint()
            .map(|c| c.contains(constraint_part))
            .unwrap_or(false),
        _ => false,
    }
}

/// Family model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Family {
    /// Unique family ID (UUID v4)
    pub id: Uuid,

    /// Family name
    pub name: String,

    /// Optional icon URL
    pub icon_url: Option<String>,

    /// Current invite code, unique across all families
    pub invite_code: String,

    /// Owning user; the owner can never leave the family
    pub created_by: Uuid,

    /// When the family was created
    pub created_at: DateTime<Utc>,
}

/// A family annotated with its live active-member count
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FamilySummary {
    /// Family ID
    pub id: Uuid,

    /// Family name
    pub name: String,

    /// Optional icon URL
    pub icon_url: Option<String>,

    /// Owning user
    pub created_by: Uuid,

    /// Number of active members
    pub member_count: i64,

    /// When the family was created
    pub created_at: DateTime<Utc>,
}

impl Family {
    /// Creates a family and seeds the owner's membership, atomically
    ///
    /// The family row and the owner's parent membership are inserted in one
    /// transaction. Invite-code generation is retried once if the generated
    /// code collides with an existing family.
    ///
    /// # Errors
    ///
    /// Propagates database errors; a second invite-code collision surfaces
    /// as the underlying unique violation. An owner who already holds an
    /// active membership trips the one-active-membership index.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use kazoku_shared::models::family::Family;
    /// # use sqlx::PgPool;
    /// # use uuid::Uuid;
    /// # async fn example(pool: PgPool, owner_id: Uuid) -> Result<(), sqlx::Error> {
    /// let family = Family::create_with_owner(&pool, "Smith", owner_id).await?;
    /// assert_eq!(family.invite_code.len(), 6);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create_with_owner(
        pool: &PgPool,
        name: &str,
        owner_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        // ON CONFLICT DO NOTHING keeps the transaction alive on a code
        // collision so we can retry within it.
        let mut family = Self::try_insert(&mut *tx, name, &generate_invite_code(), owner_id).await?;
        if family.is_none() {
            family = Self::try_insert(&mut *tx, name, &generate_invite_code(), owner_id).await?;
        }
        let family = family.ok_or_else(|| sqlx::Error::Protocol(
            "invite code collision persisted across retry".into(),
        ))?;

        FamilyMember::create(
            &mut *tx,
            CreateFamilyMember {
                family_id: family.id,
                user_id: owner_id,
                role: UserRole::Parent,
            },
        )
        .await?;

        tx.commit().await?;

        Ok(family)
    }

    /// Inserts a family row, returning None on an invite-code collision
    async fn try_insert<'e>(
        executor: impl PgExecutor<'e>,
        name: &str,
        invite_code: &str,
        created_by: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let family = sqlx::query_as::<_, Family>(
            r#"
            INSERT INTO families (name, invite_code, created_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (invite_code) DO NOTHING
            RETURNING id, name, icon_url, invite_code, created_by, created_at
            "#,
        )
        .bind(name)
        .bind(invite_code)
        .bind(created_by)
        .fetch_optional(executor)
        .await?;

        Ok(family)
    }

    /// Finds a family by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let family = sqlx::query_as::<_, Family>(
            r#"
            SELECT id, name, icon_url, invite_code, created_by, created_at
            FROM families
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(family)
    }

    /// Lists the families where a user holds an active membership
    ///
    /// Each entry carries a live count of active members.
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<FamilySummary>, sqlx::Error> {
        let families = sqlx::query_as::<_, FamilySummary>(
            r#"
            SELECT f.id, f.name, f.icon_url, f.created_by, f.created_at,
                   (SELECT COUNT(*) FROM family_members c
                    WHERE c.family_id = f.id AND c.status = 'active') AS member_count
            FROM families f
            JOIN family_members m ON m.family_id = f.id
            WHERE m.user_id = $1 AND m.status = $2
            ORDER BY f.created_at ASC
            "#,
        )
        .bind(user_id)
        .bind(MemberStatus::Active)
        .fetch_all(pool)
        .await?;

        Ok(families)
    }

    /// Overwrites the invite code with a freshly generated one
    ///
    /// Retries generation once on a collision, mirroring creation.
    ///
    /// # Returns
    ///
    /// The updated family, or None if the family doesn't exist
    pub async fn regenerate_invite_code(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        match Self::try_set_invite_code(pool, id, &generate_invite_code()).await {
            Err(e) if is_unique_violation(&e, "invite_code") => {
                Self::try_set_invite_code(pool, id, &generate_invite_code()).await
            }
            other => other,
        }
    }

    async fn try_set_invite_code(
        pool: &PgPool,
        id: Uuid,
        invite_code: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let family = sqlx::query_as::<_, Family>(
            r#"
            UPDATE families
            SET invite_code = $2
            WHERE id = $1
            RETURNING id, name, icon_url, invite_code, created_by, created_at
            "#,
        )
        .bind(id)
        .bind(invite_code)
        .fetch_optional(pool)
        .await?;

        Ok(family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_invite_code_format() {
        for _ in 0..100 {
            let code = generate_invite_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        }
    }

    #[test]
    fn test_generate_invite_code_varies() {
        // 48 bits of entropy: 100 draws colliding would indicate a broken RNG
        let codes: std::collections::HashSet<String> =
            (0..100).map(|_| generate_invite_code()).collect();
        assert!(codes.len() > 90);
    }
}
