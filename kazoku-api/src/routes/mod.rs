/// API route handlers
///
/// - `health`: health check endpoint
/// - `auth`: verification codes, registration, login, token refresh, logout
/// - `users`: profile, role assignment, device tokens
/// - `families`: family lifecycle, invite codes, membership

pub mod auth;
pub mod families;
pub mod health;
pub mod users;
