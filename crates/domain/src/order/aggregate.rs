//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AccountEmail, AggregateId, Money};
use event_store::Version;

use crate::aggregate::Aggregate;

use super::{OrderError, OrderEvent, OrderLine, OrderStatus};

/// Order aggregate root.
///
/// Owned by one account. Created in CREATED, lines replaceable only while
/// CREATED, completed at most once, cancellable from CREATED or COMPLETED.
#[derive(Debug, Clone, Default)]
pub struct Order {
    id: Option<AggregateId>,
    version: Version,
    account: Option<AccountEmail>,
    status: OrderStatus,
    lines: Vec<OrderLine>,
    total_amount: Money,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderCreated(data) => {
                self.id = Some(data.order_id);
                self.account = Some(data.account);
                self.status = OrderStatus::Created;
                self.set_lines(data.lines);
                self.created_at = Some(data.created_at);
                self.updated_at = Some(data.created_at);
            }
            OrderEvent::OrderLinesReplaced(data) => {
                self.set_lines(data.lines);
                self.updated_at = Some(data.replaced_at);
            }
            OrderEvent::OrderCompleted(data) => {
                self.status = OrderStatus::Completed;
                self.updated_at = Some(data.completed_at);
            }
            OrderEvent::OrderCancelled(data) => {
                self.status = OrderStatus::Canceled;
                self.updated_at = Some(data.cancelled_at);
            }
        }
    }
}

impl Order {
    fn set_lines(&mut self, lines: Vec<OrderLine>) {
        self.total_amount = lines.iter().map(OrderLine::line_total).sum();
        self.lines = lines;
    }

    fn require_created(&self) -> Result<(), OrderError> {
        if self.id.is_none() {
            return Err(OrderError::NotCreated);
        }
        Ok(())
    }
}

// Query methods
impl Order {
    pub fn account(&self) -> Option<&AccountEmail> {
        self.account.as_ref()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Sum of unit price times quantity over the current lines.
    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_owned_by(&self, account: &AccountEmail) -> bool {
        self.account.as_ref() == Some(account)
    }
}

// Command methods (return events)
impl Order {
    pub fn create(
        &self,
        order_id: AggregateId,
        account: AccountEmail,
        lines: Vec<OrderLine>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyCreated);
        }
        OrderLine::validate_all(&lines)?;

        Ok(vec![OrderEvent::order_created(order_id, account, lines)])
    }

    /// Replaces every line. Status is checked before ownership.
    pub fn replace_lines(
        &self,
        account: &AccountEmail,
        lines: Vec<OrderLine>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.require_created()?;
        if !self.status.can_modify_lines() {
            return Err(OrderError::InvalidStateTransition {
                current: self.status,
                action: "update",
            });
        }
        if !self.is_owned_by(account) {
            return Err(OrderError::NotOwner);
        }
        OrderLine::validate_all(&lines)?;

        Ok(vec![OrderEvent::lines_replaced(lines)])
    }

    pub fn complete(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.require_created()?;
        if !self.status.can_complete() {
            return Err(OrderError::InvalidStateTransition {
                current: self.status,
                action: "complete",
            });
        }

        Ok(vec![OrderEvent::order_completed()])
    }

    /// Cancels the order. Cancelling a CANCELED order yields no events.
    pub fn cancel(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.require_created()?;
        if !self.status.can_cancel() {
            return Ok(vec![]);
        }

        Ok(vec![OrderEvent::order_cancelled(
            self.status.holds_inventory(),
        )])
    }
}
