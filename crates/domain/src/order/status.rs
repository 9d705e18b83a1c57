//! Order status machine.

use serde::{Deserialize, Serialize};

/// The status of an order.
///
/// ```text
/// CREATED ──► COMPLETED ──► CANCELED
///    │                         ▲
///    └─────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Lines may be replaced; awaiting payment.
    #[default]
    Created,

    /// Paid and inventory deducted.
    Completed,

    /// Terminal.
    Canceled,
}

impl OrderStatus {
    /// Returns true if lines can be replaced in this status.
    pub fn can_modify_lines(&self) -> bool {
        matches!(self, OrderStatus::Created)
    }

    pub fn can_complete(&self) -> bool {
        matches!(self, OrderStatus::Created)
    }

    pub fn can_cancel(&self) -> bool {
        !matches!(self, OrderStatus::Canceled)
    }

    /// Returns true if cancelling from this status must give inventory back.
    pub fn holds_inventory(&self) -> bool {
        matches!(self, OrderStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Canceled => "CANCELED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
