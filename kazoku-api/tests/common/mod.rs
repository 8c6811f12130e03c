//! Common test utilities for integration tests
//!
//! Shared infrastructure: test database setup (with migrations), router
//! construction, request helpers, and shortcuts for building users in a
//! given role. Verification codes never leave the server through responses,
//! so tests read them straight from the database, standing in for the
//! SMS/email side-channel.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use kazoku_api::app::{build_router, AppState};
use kazoku_api::config::{ApiConfig, Config, DatabaseConfig, InviteConfig, JwtConfig};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt as _;
use uuid::Uuid;

/// JWT secret used by all integration tests
pub const TEST_JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Test context containing the app under test and a database handle
pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
    pub config: Config,
}

impl TestContext {
    /// Creates a test context against the database in `DATABASE_URL`
    pub async fn new() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set for integration tests"))?;

        let config = Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                production: false,
            },
            database: DatabaseConfig {
                url: database_url.clone(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: TEST_JWT_SECRET.to_string(),
            },
            invite: InviteConfig {
                url_base: "https://kazoku.app/join".to_string(),
            },
        };

        let db = PgPool::connect(&database_url).await?;

        // Path relative to the kazoku-api Cargo.toml
        sqlx::migrate!("../migrations").run(&db).await?;

        let app = build_router(AppState::new(db.clone(), config.clone()));

        Ok(Self { db, app, config })
    }

    /// Sends a JSON request and returns (status, parsed body)
    ///
    /// The body is `Value::Null` for empty (204-style) responses.
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        bearer: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");

        if let Some(token) = bearer {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let request = builder
            .body(Body::from(
                body.map(|b| b.to_string()).unwrap_or_else(|| "{}".to_string()),
            ))
            .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, value)
    }

    /// Reads the newest unused verification code for a target from the
    /// database (the test stand-in for the delivery side-channel)
    pub async fn latest_code(&self, target: &str) -> String {
        let (code,): (String,) = sqlx::query_as(
            r#"
            SELECT code FROM verification_codes
            WHERE target = $1 AND used_at IS NULL
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(target)
        .fetch_one(&self.db)
        .await
        .expect("an unused code should exist for the target");

        code
    }

    /// Runs the full send-code → verify-code → register flow for a fresh
    /// phone number; returns the register response (tokens + user)
    pub async fn register_phone_user(&self, phone: &str, display_name: &str) -> Value {
        let (status, _) = self
            .request(
                "POST",
                "/v1/auth/send-code",
                Some(json!({ "phoneNumber": phone })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let code = self.latest_code(phone).await;

        let (status, body) = self
            .request(
                "POST",
                "/v1/auth/verify-code",
                Some(json!({ "phoneNumber": phone, "code": code })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isNewUser"], true);

        let (status, body) = self
            .request(
                "POST",
                "/v1/auth/register",
                Some(json!({
                    "phoneNumber": phone,
                    "displayName": display_name,
                    "verificationCode": code,
                })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

        body
    }

    /// Registers a user and assigns a role; returns the access token
    pub async fn user_with_role(&self, role: &str) -> String {
        let registered = self
            .register_phone_user(&unique_phone(), &format!("{}-user", role))
            .await;
        let token = registered["accessToken"].as_str().unwrap().to_string();

        let (status, _) = self
            .request(
                "POST",
                "/v1/users/me/role",
                Some(json!({ "role": role })),
                Some(&token),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        token
    }
}

/// Generates a unique E.164-ish phone number for test isolation
pub fn unique_phone() -> String {
    let digits: String = Uuid::new_v4()
        .as_u128()
        .to_string()
        .chars()
        .take(12)
        .collect();
    format!("+81{}", digits)
}

/// Extracts the stable error code out of an error response body
pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or("")
}
