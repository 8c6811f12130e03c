/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and verification
/// - [`jwt`]: JWT claims, signing, and validation
/// - [`tokens`]: token-pair issuance, single-use refresh rotation, logout
/// - [`middleware`]: bearer-token guard and role gate
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id with 64 MB memory, 3 iterations
/// - **JWT Tokens**: HS256 signing; 15-minute access, 30-day refresh
/// - **Rotation**: refresh tokens are single-use; the consumed row dies in
///   the same transaction that persists its replacement

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod tokens;
