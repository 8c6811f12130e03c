/// Verification code store
///
/// One-time 6-digit codes proving control of a phone number or email
/// address. At most one *unused* code exists per target at any time: issuing
/// a new code invalidates all prior unused codes for the same target in the
/// same transaction. Codes are consumable exactly once while unexpired, and
/// rows are never deleted — consumed rows remain as an audit trail that
/// registration consults within a 10-minute window.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE verification_codes (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     target VARCHAR(255) NOT NULL,
///     code VARCHAR(6) NOT NULL,
///     type verification_type NOT NULL,
///     expires_at TIMESTAMPTZ NOT NULL,
///     used_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Validity window of a freshly issued code
pub const CODE_TTL_MINUTES: i64 = 10;

/// Window after consumption during which registration accepts the code
pub const CONSUMED_WINDOW_MINUTES: i64 = 10;

/// Fixed client-facing retry delay returned by send-code
pub const RETRY_AFTER_SECS: u64 = 60;

/// Kind of target a code was sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "verification_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VerificationType {
    /// Sent via SMS to a phone number
    Phone,

    /// Sent via email
    Email,
}

/// A one-time verification code row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VerificationCode {
    /// Row ID
    pub id: Uuid,

    /// Phone number or email address the code was sent to
    pub target: String,

    /// 6-digit numeric code
    pub code: String,

    /// Target kind
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: VerificationType,

    /// Hard expiry; the code is unusable afterwards
    pub expires_at: DateTime<Utc>,

    /// Set when consumed; a non-null value makes the code dead for verify
    /// but visible to registration's recency check
    pub used_at: Option<DateTime<Utc>>,

    /// When the code was issued
    pub created_at: DateTime<Utc>,
}

/// Generates a 6-digit numeric code, uniform in [100000, 999999]
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

impl VerificationCode {
    /// Issues a new code for a target, invalidating any prior unused codes
    ///
    /// Invalidation and insertion happen in one transaction so that at most
    /// one unused code per target exists at any point observable by
    /// `consume`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails.
    pub async fn issue(
        pool: &PgPool,
        target: &str,
        kind: VerificationType,
    ) -> Result<Self, sqlx::Error> {
        let code = generate_code();
        let expires_at = Utc::now() + Duration::minutes(CODE_TTL_MINUTES);

        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE verification_codes
            SET used_at = NOW()
            WHERE target = $1 AND used_at IS NULL
            "#,
        )
        .bind(target)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, VerificationCode>(
            r#"
            INSERT INTO verification_codes (target, code, type, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, target, code, type, expires_at, used_at, created_at
            "#,
        )
        .bind(target)
        .bind(&code)
        .bind(kind)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row)
    }

    /// Consumes a code: marks it used if it matches, is unused, and unexpired
    ///
    /// The guarded UPDATE makes consumption atomic — two concurrent calls
    /// with the same code see exactly one success.
    ///
    /// # Returns
    ///
    /// The consumed row, or None when no live code matched. Callers surface
    /// None as a single `InvalidCode` error: "not found", "expired", and
    /// "already used" are deliberately indistinguishable to clients.
    pub async fn consume(
        pool: &PgPool,
        target: &str,
        code: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let row = sqlx::query_as::<_, VerificationCode>(
            r#"
            UPDATE verification_codes
            SET used_at = NOW()
            WHERE target = $1 AND code = $2 AND used_at IS NULL AND expires_at > NOW()
            RETURNING id, target, code, type, expires_at, used_at, created_at
            "#,
        )
        .bind(target)
        .bind(code)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    /// Checks that a code was consumed via `consume` within the recency window
    ///
    /// Registration calls this to confirm the caller completed verification
    /// recently; a consumption older than the window no longer counts.
    pub async fn was_recently_consumed(
        pool: &PgPool,
        target: &str,
        code: &str,
    ) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM verification_codes
                WHERE target = $1
                  AND code = $2
                  AND used_at IS NOT NULL
                  AND used_at > NOW() - make_interval(mins => $3)
            )
            "#,
        )
        .bind(target)
        .bind(code)
        .bind(CONSUMED_WINDOW_MINUTES as i32)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_code_is_six_digits() {
        for _ in 0..1000 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().expect("code is numeric");
            assert!((100_000..=999_999).contains(&n));
        }
    }

    #[test]
    fn test_verification_type_serde() {
        assert_eq!(serde_json::to_string(&VerificationType::Phone).unwrap(), "\"phone\"");
        assert_eq!(
            serde_json::from_str::<VerificationType>("\"email\"").unwrap(),
            VerificationType::Email
        );
        assert!(serde_json::from_str::<VerificationType>("\"fax\"").is_err());
    }

    // Issue/consume lifecycle tests live in kazoku-api/tests (they need a
    // live database).
}
