//! Order lifecycle manager.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use common::{AccountEmail, AggregateId, Caller};
use domain::{Aggregate, CommandHandler, Order, OrderLine, OrderStatus};
use event_bus::{EventPublisher, IntegrationEvent};
use event_store::{EventQuery, EventStore};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::compensation::{self, Adjustment};
use crate::error::{Result, SagaError};
use crate::gateways::{GatewayError, InventoryGateway, OrderSnapshot, OrderSnapshotReader};

/// Load-restock-commit attempts made by `cancel` before giving up.
const CANCEL_ATTEMPTS: u32 = 3;

/// A requested order line: a product code and how many units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub upc: String,
    pub quantity: u32,
}

impl LineRequest {
    pub fn new(upc: impl Into<String>, quantity: u32) -> Self {
        Self {
            upc: upc.into(),
            quantity,
        }
    }
}

/// Creates, edits, completes and cancels orders.
///
/// Completing an order deducts stock line by line and compensates on
/// failure. Every status write is conditioned on the version the decision
/// was made against, so two racing transitions cannot both commit.
pub struct OrderLifecycleManager {
    orders: CommandHandler<Arc<dyn EventStore>, Order>,
    inventory: Arc<dyn InventoryGateway>,
    publisher: Arc<dyn EventPublisher>,
}

impl OrderLifecycleManager {
    pub fn new(
        store: Arc<dyn EventStore>,
        inventory: Arc<dyn InventoryGateway>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            orders: CommandHandler::new(store),
            inventory,
            publisher,
        }
    }

    /// Creates an order owned by the caller, priced from the catalog.
    #[tracing::instrument(skip(self, lines), fields(line_count = lines.len()))]
    pub async fn create(&self, caller: &Caller, lines: Vec<LineRequest>) -> Result<Order> {
        let account = caller.authenticated().ok_or(SagaError::Unauthenticated)?;
        validate_lines(&lines)?;
        let lines = self.resolve(lines).await?;

        let order_id = AggregateId::new();
        let account = account.clone();
        let result = self
            .orders
            .execute(order_id, |order| order.create(order_id, account, lines))
            .await?;

        tracing::info!(
            %order_id,
            total = %result.aggregate.total_amount(),
            "order created"
        );
        metrics::counter!("orders_created_total").increment(1);

        Ok(result.aggregate)
    }

    /// Replaces every line of a CREATED order owned by the caller.
    #[tracing::instrument(skip(self, lines), fields(line_count = lines.len()))]
    pub async fn update(
        &self,
        caller: &Caller,
        order_id: AggregateId,
        lines: Vec<LineRequest>,
    ) -> Result<Order> {
        let account = caller.authenticated().ok_or(SagaError::Unauthenticated)?;
        validate_lines(&lines)?;
        let order = self.get(order_id).await?;

        // Status before ownership.
        if !order.status().can_modify_lines() {
            return Err(invalid_transition(order.status(), "update"));
        }
        if !order.is_owned_by(account) {
            return Err(SagaError::Forbidden);
        }

        let lines = self.resolve(lines).await?;
        let result = self
            .orders
            .execute_at(order_id, order.version(), |order| {
                order.replace_lines(account, lines)
            })
            .await?;

        tracing::info!(%order_id, total = %result.aggregate.total_amount(), "order lines replaced");
        Ok(result.aggregate)
    }

    /// Deducts stock for every line and marks the order COMPLETED.
    ///
    /// Nothing is deducted if any line is short. If a deduction fails, the
    /// lines already deducted are restored and the order stays CREATED.
    #[tracing::instrument(skip(self))]
    pub async fn complete(&self, order_id: AggregateId) -> Result<Order> {
        let started = Instant::now();

        let order = self.get(order_id).await?;
        if !order.status().can_complete() {
            return Err(invalid_transition(order.status(), "complete"));
        }
        let seen = order.version();

        // 1. Check availability for every line before touching stock
        for line in order.lines() {
            let available = self
                .inventory
                .lookup_by_code(&line.upc)
                .await?
                .map(|item| item.available_units)
                .unwrap_or(0);
            if available < line.quantity {
                tracing::warn!(%order_id, upc = %line.upc, requested = line.quantity, available, "insufficient stock");
                return Err(SagaError::InsufficientStock {
                    upc: line.upc.clone(),
                    requested: line.quantity,
                    available,
                });
            }
        }

        // 2. Deduct sequentially, compensating on the first failure
        let mut deducted = Vec::with_capacity(order.lines().len());
        for line in order.lines() {
            let adjustment = Adjustment::new(&line.item_id, &line.upc, -i64::from(line.quantity));
            if let Err(e) = self.inventory.adjust(&adjustment.item_id, adjustment.delta).await {
                tracing::error!(
                    %order_id,
                    upc = %line.upc,
                    deducted = deducted.len(),
                    error = %e,
                    "stock deduction failed, compensating"
                );
                compensation::compensate(self.inventory.as_ref(), &deducted).await;
                return Err(SagaError::InventoryAdjustmentFailed {
                    order_id,
                    upc: line.upc.clone(),
                    reason: e.to_string(),
                });
            }
            deducted.push(adjustment);
        }

        // 3. Commit against the version the checks were made on
        let result = match self
            .orders
            .execute_at(order_id, seen, |order| order.complete())
            .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(%order_id, error = %e, "completion lost, restoring stock");
                compensation::compensate(self.inventory.as_ref(), &deducted).await;
                return Err(e.into());
            }
        };

        tracing::info!(%order_id, lines = deducted.len(), "order completed");
        metrics::counter!("orders_completed_total").increment(1);
        metrics::histogram!("order_completion_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        Ok(result.aggregate)
    }

    /// Cancels an order, restoring stock if it was COMPLETED.
    ///
    /// Cancelling a CANCELED order returns it unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, order_id: AggregateId) -> Result<Order> {
        for attempt in 1..=CANCEL_ATTEMPTS {
            let order = self.get(order_id).await?;
            if order.status() == OrderStatus::Canceled {
                return Ok(order);
            }

            let restocked = if order.status().holds_inventory() {
                let restock = order
                    .lines()
                    .iter()
                    .map(|line| Adjustment::new(&line.item_id, &line.upc, i64::from(line.quantity)))
                    .collect::<Vec<_>>();
                let (applied, failed) =
                    compensation::apply_best_effort(self.inventory.as_ref(), restock).await;
                if !failed.is_empty() {
                    tracing::error!(%order_id, failed = failed.len(), "restock incomplete, stock needs reconciliation");
                }
                applied
            } else {
                Vec::new()
            };

            match self
                .orders
                .execute_at(order_id, order.version(), |order| order.cancel())
                .await
            {
                Ok(result) => {
                    tracing::info!(%order_id, restocked = restocked.len(), "order cancelled");
                    metrics::counter!("orders_cancelled_total").increment(1);
                    self.publish(IntegrationEvent::OrderCancelled { order_id }).await;
                    return Ok(result.aggregate);
                }
                Err(e) if e.is_conflict() => {
                    tracing::warn!(%order_id, attempt, "order changed during cancel, retrying");
                    compensation::compensate(self.inventory.as_ref(), &restocked).await;
                }
                Err(e) => {
                    compensation::compensate(self.inventory.as_ref(), &restocked).await;
                    return Err(e.into());
                }
            }
        }

        Err(SagaError::ConcurrentModification(order_id))
    }

    pub async fn get(&self, order_id: AggregateId) -> Result<Order> {
        self.orders
            .load_existing(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))
    }

    /// Orders owned by `account`, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_by_account(&self, account: &AccountEmail) -> Result<Vec<Order>> {
        let query = created_orders().payload_contains(json!({
            "data": { "account": account.as_str() }
        }));
        Ok(self.orders.load_matching(query).await?)
    }

    /// Every order, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Order>> {
        Ok(self.orders.load_matching(created_orders()).await?)
    }

    async fn resolve(&self, requests: Vec<LineRequest>) -> Result<Vec<OrderLine>> {
        let mut lines = Vec::with_capacity(requests.len());
        for request in requests {
            let item = self
                .inventory
                .lookup_by_code(&request.upc)
                .await?
                .ok_or_else(|| SagaError::CatalogItemNotFound(request.upc.clone()))?;
            lines.push(OrderLine::new(
                item.item_id,
                item.upc,
                item.name,
                item.unit_price,
                request.quantity,
            ));
        }
        Ok(lines)
    }

    async fn publish(&self, event: IntegrationEvent) {
        let topic = event.topic();
        if let Err(e) = self.publisher.publish(event).await {
            tracing::error!(topic, error = %e, "failed to publish event");
            metrics::counter!("events_publish_failed_total", "topic" => topic).increment(1);
        }
    }
}

#[async_trait]
impl OrderSnapshotReader for OrderLifecycleManager {
    async fn get(&self, order_id: AggregateId) -> std::result::Result<Option<OrderSnapshot>, GatewayError> {
        let order = self
            .orders
            .load_existing(order_id)
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        Ok(order.map(|order| OrderSnapshot {
            id: order_id,
            status: order.status(),
            total_amount: order.total_amount(),
        }))
    }
}

fn created_orders() -> EventQuery {
    EventQuery::for_aggregate_type(Order::aggregate_type()).event_type("OrderCreated")
}

fn invalid_transition(current: OrderStatus, action: &'static str) -> SagaError {
    SagaError::InvalidTransition {
        current: current.to_string(),
        action,
    }
}

fn validate_lines(lines: &[LineRequest]) -> Result<()> {
    if lines.is_empty() {
        return Err(SagaError::Validation("order must have at least one line".to_string()));
    }
    for line in lines {
        if line.upc.trim().is_empty() {
            return Err(SagaError::Validation("product code must not be blank".to_string()));
        }
        if line.quantity == 0 {
            return Err(SagaError::Validation(format!(
                "quantity for '{}' must be at least 1",
                line.upc
            )));
        }
    }
    Ok(())
}
