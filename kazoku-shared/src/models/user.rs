/// User model and database operations
///
/// This module provides the User model for family-account holders. Accounts
/// are anchored to a phone number or an email address (at least one is
/// present); a password is optional — phone-only accounts authenticate with
/// verification codes alone.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     phone_number VARCHAR(32) UNIQUE,
///     email CITEXT UNIQUE,
///     password_hash VARCHAR(255),
///     display_name VARCHAR(50) NOT NULL,
///     avatar_url VARCHAR(512),
///     role user_role,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Role
///
/// `role` starts out unset and is assigned exactly once (`parent` or
/// `child`). Role-gated operations reject users who have not picked one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Account role within a family
///
/// Set once via the role-assignment operation and immutable thereafter.
/// Parents create families and manage invite codes; children join via
/// invite codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Creates and administers a family
    Parent,

    /// Joins a family via invite code
    Child,
}

impl UserRole {
    /// Converts role to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Parent => "parent",
            UserRole::Child => "child",
        }
    }
}

/// User model representing a family-account holder
///
/// Passwords are stored as Argon2id hashes, never in plaintext, and are
/// absent for phone-only accounts.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    /// Phone number in E.164 form, unique when present
    pub phone_number: Option<String>,

    /// Email address (case-insensitive via CITEXT), unique when present
    pub email: Option<String>,

    /// Argon2id password hash; None for code-only accounts
    pub password_hash: Option<String>,

    /// Display name shown to family members
    pub display_name: String,

    /// Optional avatar URL
    pub avatar_url: Option<String>,

    /// Account role; None until assigned
    pub role: Option<UserRole>,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

/// Client-facing user representation
///
/// Mirrors the wire contract: camelCase fields, no password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    /// User ID
    pub id: Uuid,

    /// Phone number, if set
    pub phone_number: Option<String>,

    /// Email address, if set
    pub email: Option<String>,

    /// Display name
    pub display_name: String,

    /// Avatar URL, if set
    pub avatar_url: Option<String>,

    /// Account role, if assigned
    pub role: Option<UserRole>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last-update timestamp
    pub updated_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            phone_number: user.phone_number,
            email: user.email,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Phone number (at least one of phone/email is required)
    pub phone_number: Option<String>,

    /// Email address
    pub email: Option<String>,

    /// Argon2id password hash (NOT the plaintext password), if any
    pub password_hash: Option<String>,

    /// Display name
    pub display_name: String,
}

impl User {
    /// Creates a new user in the database
    ///
    /// # Errors
    ///
    /// Returns an error if the phone number or email already exists (unique
    /// constraint violation) or the database connection fails.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use kazoku_shared::models::user::{User, CreateUser};
    /// # use sqlx::PgPool;
    /// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
    /// let user = User::create(&pool, CreateUser {
    ///     phone_number: Some("+819000000001".to_string()),
    ///     email: None,
    ///     password_hash: None,
    ///     display_name: "Hanako".to_string(),
    /// }).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (phone_number, email, password_hash, display_name)
            VALUES ($1, $2, $3, $4)
            RETURNING id, phone_number, email, password_hash, display_name, avatar_url,
                      role, created_at, updated_at
            "#,
        )
        .bind(data.phone_number)
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.display_name)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, phone_number, email, password_hash, display_name, avatar_url,
                   role, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by email address (case-insensitive via CITEXT)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, phone_number, email, password_hash, display_name, avatar_url,
                   role, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by phone number
    pub async fn find_by_phone(pool: &PgPool, phone_number: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, phone_number, email, password_hash, display_name, avatar_url,
                   role, created_at, updated_at
            FROM users
            WHERE phone_number = $1
            "#,
        )
        .bind(phone_number)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Updates the display name, bumping `updated_at`
    ///
    /// Passing `None` leaves the name unchanged (the profile-update request
    /// treats every field as optional).
    ///
    /// # Returns
    ///
    /// The updated user if found, None if the user doesn't exist
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        display_name: Option<String>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET display_name = COALESCE($2, display_name),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, phone_number, email, password_hash, display_name, avatar_url,
                      role, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(display_name)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Assigns the account role, once
    ///
    /// The `role IS NULL` guard makes the assignment first-writer-wins even
    /// under concurrent requests.
    ///
    /// # Returns
    ///
    /// The updated user, or None if the user doesn't exist or already has a
    /// role (the caller distinguishes the two by loading the user first).
    pub async fn set_role(
        pool: &PgPool,
        id: Uuid,
        role: UserRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET role = $2, updated_at = NOW()
            WHERE id = $1 AND role IS NULL
            RETURNING id, phone_number, email, password_hash, display_name, avatar_url,
                      role, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(role)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_as_str() {
        assert_eq!(UserRole::Parent.as_str(), "parent");
        assert_eq!(UserRole::Child.as_str(), "child");
    }

    #[test]
    fn test_user_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&UserRole::Parent).unwrap(), "\"parent\"");
        assert_eq!(
            serde_json::from_str::<UserRole>("\"child\"").unwrap(),
            UserRole::Child
        );
        // Closed enumeration: unknown values are rejected at the boundary
        assert!(serde_json::from_str::<UserRole>("\"admin\"").is_err());
    }

    #[test]
    fn test_public_user_omits_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            phone_number: Some("+819000000001".to_string()),
            email: None,
            password_hash: Some("$argon2id$secret".to_string()),
            display_name: "Hanako".to_string(),
            avatar_url: None,
            role: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(PublicUser::from(user)).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["phoneNumber"], "+819000000001");
        assert!(json["role"].is_null());
    }

    // Integration tests for database operations live in kazoku-api/tests.
}
