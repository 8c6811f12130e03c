/// Database plumbing
///
/// - `pool`: PostgreSQL connection pool construction with health check
/// - `migrations`: sqlx migration runner invoked at startup

pub mod migrations;
pub mod pool;
