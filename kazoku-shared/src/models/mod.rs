/// Database models for the kazoku backend
///
/// # Models
///
/// - `user`: account holders with optional phone/email/password and a
///   once-settable role
/// - `verification`: one-time verification codes per target
/// - `refresh_token`: persisted refresh-token sessions
/// - `family`: family groups and their invite codes
/// - `family_member`: the membership join entity (active/left lifecycle)
/// - `device_token`: push-token registry (delivery itself is out of scope)

pub mod device_token;
pub mod family;
pub mod family_member;
pub mod refresh_token;
pub mod user;
pub mod verification;
