/// Device token registry
///
/// Stores push-notification tokens per user and platform. Registration is
/// an upsert on `(user_id, token)`: re-registering the same token just
/// refreshes its platform and timestamp. Actual push delivery is out of
/// scope.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE device_tokens (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     token TEXT NOT NULL,
///     platform device_platform NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (user_id, token)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Mobile platform a device token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "device_platform", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DevicePlatform {
    /// Apple Push Notification service
    Ios,

    /// Firebase Cloud Messaging
    Android,
}

/// Device token row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeviceToken {
    /// Row ID
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Opaque platform token
    pub token: String,

    /// Platform the token targets
    pub platform: DevicePlatform,

    /// First registration
    pub created_at: DateTime<Utc>,

    /// Last registration of the same token
    pub updated_at: DateTime<Utc>,
}

impl DeviceToken {
    /// Registers a device token, upserting on `(user_id, token)`
    pub async fn upsert(
        pool: &PgPool,
        user_id: Uuid,
        token: &str,
        platform: DevicePlatform,
    ) -> Result<Self, sqlx::Error> {
        let row = sqlx::query_as::<_, DeviceToken>(
            r#"
            INSERT INTO device_tokens (user_id, token, platform)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, token)
            DO UPDATE SET platform = EXCLUDED.platform, updated_at = NOW()
            RETURNING id, user_id, token, platform, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(platform)
        .fetch_one(pool)
        .await?;

        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_platform_serde() {
        assert_eq!(serde_json::to_string(&DevicePlatform::Ios).unwrap(), "\"ios\"");
        assert_eq!(
            serde_json::from_str::<DevicePlatform>("\"android\"").unwrap(),
            DevicePlatform::Android
        );
        assert!(serde_json::from_str::<DevicePlatform>("\"windows\"").is_err());
    }
}
