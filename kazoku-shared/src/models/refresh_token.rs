/// Refresh token persistence
///
/// One row per active session. Rotation (see [`crate::auth::tokens`])
/// always deletes the consumed row and inserts a fresh one inside a single
/// transaction, so a refresh token can never validate twice. Logout deletes
/// every row for the user.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE refresh_tokens (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     token TEXT NOT NULL UNIQUE,
///     expires_at TIMESTAMPTZ NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// A persisted refresh token row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RefreshToken {
    /// Row ID
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Opaque token value handed to the client (the signed JWT string)
    pub token: String,

    /// Stored expiry, checked at rotation time
    pub expires_at: DateTime<Utc>,

    /// When the session was opened
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Persists a refresh token row
    ///
    /// Generic over the executor so rotation can insert inside its own
    /// transaction.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let row = sqlx::query_as::<_, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (user_id, token, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token, expires_at, created_at
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    /// Looks up a row by raw token value, locking it for the transaction
    ///
    /// `FOR UPDATE` serializes concurrent rotations of the same token: the
    /// loser of the race sees no row and fails.
    pub async fn find_by_token_for_update<'e>(
        executor: impl PgExecutor<'e>,
        token: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let row = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT id, user_id, token, expires_at, created_at
            FROM refresh_tokens
            WHERE token = $1
            FOR UPDATE
            "#,
        )
        .bind(token)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    /// Deletes a row by ID
    pub async fn delete<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes every refresh token for a user (logout)
    ///
    /// # Returns
    ///
    /// Number of sessions revoked
    pub async fn delete_all_for_user(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}
