//! Read-only view of orders for the payment side.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::{AggregateId, Money};
use domain::OrderStatus;

use super::GatewayError;

/// The subset of an order the payment side needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSnapshot {
    pub id: AggregateId,
    pub status: OrderStatus,
    pub total_amount: Money,
}

#[async_trait]
pub trait OrderSnapshotReader: Send + Sync {
    /// Returns `None` if the order does not exist.
    async fn get(&self, order_id: AggregateId) -> Result<Option<OrderSnapshot>, GatewayError>;
}

/// Fixed set of snapshots for exercising the payment side on its own.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderSnapshots {
    snapshots: Arc<RwLock<HashMap<AggregateId, OrderSnapshot>>>,
}

impl InMemoryOrderSnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, snapshot: OrderSnapshot) {
        self.snapshots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(snapshot.id, snapshot);
    }
}

#[async_trait]
impl OrderSnapshotReader for InMemoryOrderSnapshots {
    async fn get(&self, order_id: AggregateId) -> Result<Option<OrderSnapshot>, GatewayError> {
        Ok(self
            .snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&order_id)
            .cloned())
    }
}
