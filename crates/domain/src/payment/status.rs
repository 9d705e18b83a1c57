use serde::{Deserialize, Serialize};

/// The status of a payment.
///
/// `Initiated` only exists while a submission is being decided and is never
/// persisted: a payment is recorded directly as SUCCESS or FAILED, and may
/// later move to REFUNDED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Initiated,
    Success,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Returns true for statuses a payment may be recorded with.
    pub fn is_recordable(&self) -> bool {
        matches!(self, PaymentStatus::Success | PaymentStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Initiated => "INITIATED",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
