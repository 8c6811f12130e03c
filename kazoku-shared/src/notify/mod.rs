/// Verification-code delivery collaborator
///
/// Sending codes over SMS or email is an external concern. This module
/// defines the seam: a [`Notifier`] trait the send-code flow calls, and a
/// [`LogNotifier`] that writes the code to the log instead of delivering
/// it. A real SMS/email provider would implement the same trait.
///
/// Delivery failure never fails the send-code request; the caller logs and
/// moves on.

use async_trait::async_trait;

use crate::models::verification::VerificationType;

/// Error type for code delivery
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The provider rejected or failed the delivery
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Delivery seam for verification codes
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers a verification code to its target
    async fn send_verification_code(
        &self,
        target: &str,
        kind: VerificationType,
        code: &str,
    ) -> Result<(), NotifyError>;
}

/// Logs codes instead of delivering them
///
/// Stands in for a real SMS/email provider in development and tests; the
/// code is surfaced through the log side-channel only.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_verification_code(
        &self,
        target: &str,
        kind: VerificationType,
        code: &str,
    ) -> Result<(), NotifyError> {
        tracing::info!(target_id = %target, kind = ?kind, code = %code, "Verification code issued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        let notifier = LogNotifier;
        let result = notifier
            .send_verification_code("+819000000001", VerificationType::Phone, "123456")
            .await;
        assert!(result.is_ok());
    }
}
