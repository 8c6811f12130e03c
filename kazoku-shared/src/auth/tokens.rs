/// Token pair issuance and rotation
///
/// The operations every auth flow shares: mint an access/refresh pair for a
/// user (persisting the refresh side), rotate a refresh token for a new
/// pair, and revoke all of a user's sessions.
///
/// # Rotation
///
/// Rotation is single-use by construction: the stored row is looked up by
/// raw token value with a row lock, deleted, and the replacement inserted —
/// all in one transaction. A token that has been rotated once can never
/// validate again, even when two rotations race.
///
/// # Example
///
/// ```no_run
/// use kazoku_shared::auth::tokens::{issue_pair, rotate};
/// # use sqlx::PgPool;
/// # use uuid::Uuid;
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let pair = issue_pair(&pool, "secret", user_id).await?;
/// let (next, _user_id) = rotate(&pool, "secret", &pair.refresh_token).await?;
/// assert_ne!(pair.refresh_token, next.refresh_token);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::jwt::{self, Claims, JwtError, TokenType, ACCESS_TOKEN_EXPIRES_IN_SECS};
use crate::models::refresh_token::RefreshToken;

/// Error type for token-pair operations
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Refresh token is unknown, already rotated, or past its stored expiry
    #[error("Refresh token is invalid or expired")]
    InvalidRefreshToken,

    /// Signing or validation failure
    #[error(transparent)]
    Jwt(#[from] JwtError),

    /// Database failure
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// A freshly minted access/refresh token pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Short-lived access token (bearer credential)
    pub access_token: String,

    /// Long-lived refresh token, persisted server-side
    pub refresh_token: String,

    /// Access token lifetime in seconds (always 900)
    pub expires_in: u64,
}

/// Signs an access/refresh pair for a user
///
/// Returns the pair plus the refresh expiry so callers can persist the
/// refresh row with a matching timestamp.
fn sign_pair(user_id: Uuid, secret: &str) -> Result<(TokenPair, DateTime<Utc>), JwtError> {
    let access_claims = Claims::new(user_id, TokenType::Access);
    let refresh_claims = Claims::new(user_id, TokenType::Refresh);

    let access_token = jwt::create_token(&access_claims, secret)?;
    let refresh_token = jwt::create_token(&refresh_claims, secret)?;

    let refresh_expires_at = DateTime::<Utc>::from_timestamp(refresh_claims.exp, 0)
        .unwrap_or_else(|| Utc::now() + TokenType::Refresh.lifetime());

    Ok((
        TokenPair {
            access_token,
            refresh_token,
            expires_in: ACCESS_TOKEN_EXPIRES_IN_SECS,
        },
        refresh_expires_at,
    ))
}

/// Mints a token pair for a user and persists the refresh token
///
/// # Errors
///
/// Returns an error if signing or persistence fails.
pub async fn issue_pair(
    pool: &PgPool,
    secret: &str,
    user_id: Uuid,
) -> Result<TokenPair, TokenError> {
    let (pair, refresh_expires_at) = sign_pair(user_id, secret)?;

    RefreshToken::create(pool, user_id, &pair.refresh_token, refresh_expires_at).await?;

    Ok(pair)
}

/// Rotates a refresh token: consumes the old one, issues a new pair
///
/// The stored row is resolved by raw token value. Deletion of the old row
/// and insertion of the new one share a transaction, so the old token is
/// dead the instant the new pair exists.
///
/// # Returns
///
/// The new pair and the owning user's ID.
///
/// # Errors
///
/// Returns `TokenError::InvalidRefreshToken` when the token is unknown
/// (including already-rotated) or its stored expiry has passed.
pub async fn rotate(
    pool: &PgPool,
    secret: &str,
    raw_token: &str,
) -> Result<(TokenPair, Uuid), TokenError> {
    let mut tx = pool.begin().await?;

    let stored = RefreshToken::find_by_token_for_update(&mut *tx, raw_token)
        .await?
        .ok_or(TokenError::InvalidRefreshToken)?;

    if stored.expires_at <= Utc::now() {
        return Err(TokenError::InvalidRefreshToken);
    }

    RefreshToken::delete(&mut *tx, stored.id).await?;

    let (pair, refresh_expires_at) = sign_pair(stored.user_id, secret)?;

    RefreshToken::create(&mut *tx, stored.user_id, &pair.refresh_token, refresh_expires_at)
        .await?;

    tx.commit().await?;

    Ok((pair, stored.user_id))
}

/// Revokes every session for a user (logout)
pub async fn revoke_all(pool: &PgPool, user_id: Uuid) -> Result<u64, TokenError> {
    Ok(RefreshToken::delete_all_for_user(pool, user_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_pair_distinct_tokens() {
        let (pair, refresh_expires_at) =
            sign_pair(Uuid::new_v4(), "test-secret-key-at-least-32-bytes-long").unwrap();

        assert_ne!(pair.access_token, pair.refresh_token);
        assert_eq!(pair.expires_in, 900);
        assert!(refresh_expires_at > Utc::now());
    }

    #[test]
    fn test_token_pair_wire_shape() {
        let (pair, _) = sign_pair(Uuid::new_v4(), "test-secret-key-at-least-32-bytes-long").unwrap();
        let json = serde_json::to_value(&pair).unwrap();

        assert!(json.get("accessToken").is_some());
        assert!(json.get("refreshToken").is_some());
        assert_eq!(json["expiresIn"], 900);
    }

    // Rotation single-use behavior is covered by kazoku-api integration
    // tests against a live database.
}
