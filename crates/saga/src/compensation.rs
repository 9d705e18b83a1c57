//! Best-effort reversal of inventory adjustments.

use crate::gateways::InventoryGateway;

/// One stock adjustment that was applied and may need undoing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjustment {
    pub item_id: String,
    pub upc: String,
    pub delta: i64,
}

impl Adjustment {
    pub fn new(item_id: impl Into<String>, upc: impl Into<String>, delta: i64) -> Self {
        Self {
            item_id: item_id.into(),
            upc: upc.into(),
            delta,
        }
    }

    /// The adjustment that cancels this one out.
    pub fn inverse(&self) -> Self {
        Self {
            item_id: self.item_id.clone(),
            upc: self.upc.clone(),
            delta: -self.delta,
        }
    }
}

/// Result of a compensation run. Reported to logs and metrics, never
/// surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompensationOutcome {
    Succeeded {
        applied: Vec<Adjustment>,
    },
    Partial {
        applied: Vec<Adjustment>,
        failed: Vec<Adjustment>,
    },
    Failed {
        failed: Vec<Adjustment>,
    },
}

impl CompensationOutcome {
    fn from_parts(applied: Vec<Adjustment>, failed: Vec<Adjustment>) -> Self {
        match (applied.is_empty(), failed.is_empty()) {
            (_, true) => CompensationOutcome::Succeeded { applied },
            (true, false) => CompensationOutcome::Failed { failed },
            (false, false) => CompensationOutcome::Partial { applied, failed },
        }
    }

    /// Reversing adjustments that were actually applied.
    pub fn applied(&self) -> &[Adjustment] {
        match self {
            CompensationOutcome::Succeeded { applied }
            | CompensationOutcome::Partial { applied, .. } => applied,
            CompensationOutcome::Failed { .. } => &[],
        }
    }

    pub fn failed(&self) -> &[Adjustment] {
        match self {
            CompensationOutcome::Succeeded { .. } => &[],
            CompensationOutcome::Partial { failed, .. }
            | CompensationOutcome::Failed { failed } => failed,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            CompensationOutcome::Succeeded { .. } => "succeeded",
            CompensationOutcome::Partial { .. } => "partial",
            CompensationOutcome::Failed { .. } => "failed",
        }
    }
}

/// Applies `adjustments` one by one, continuing past individual failures.
pub(crate) async fn apply_best_effort(
    inventory: &dyn InventoryGateway,
    adjustments: impl IntoIterator<Item = Adjustment>,
) -> (Vec<Adjustment>, Vec<Adjustment>) {
    let mut applied = Vec::new();
    let mut failed = Vec::new();

    for adjustment in adjustments {
        match inventory.adjust(&adjustment.item_id, adjustment.delta).await {
            Ok(available) => {
                tracing::debug!(
                    item_id = %adjustment.item_id,
                    delta = adjustment.delta,
                    available,
                    "stock adjusted"
                );
                applied.push(adjustment);
            }
            Err(e) => {
                tracing::warn!(
                    item_id = %adjustment.item_id,
                    upc = %adjustment.upc,
                    delta = adjustment.delta,
                    error = %e,
                    "stock adjustment failed"
                );
                failed.push(adjustment);
            }
        }
    }

    (applied, failed)
}

/// Undoes `done`, most recent first.
pub async fn compensate(
    inventory: &dyn InventoryGateway,
    done: &[Adjustment],
) -> CompensationOutcome {
    let reversals = done.iter().rev().map(Adjustment::inverse);
    let (applied, failed) = apply_best_effort(inventory, reversals).await;
    let outcome = CompensationOutcome::from_parts(applied, failed);

    match &outcome {
        CompensationOutcome::Succeeded { applied } => {
            tracing::info!(reversed = applied.len(), "compensation succeeded");
        }
        CompensationOutcome::Partial { applied, failed } => {
            tracing::error!(
                reversed = applied.len(),
                failed = failed.len(),
                "compensation partially failed, stock needs reconciliation"
            );
        }
        CompensationOutcome::Failed { failed } => {
            tracing::error!(
                failed = failed.len(),
                "compensation failed, stock needs reconciliation"
            );
        }
    }
    metrics::counter!("inventory_compensations_total", "outcome" => outcome.label()).increment(1);

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateways::{CatalogItem, InMemoryInventory};
    use common::Money;

    fn inventory() -> InMemoryInventory {
        InMemoryInventory::with_items(["1", "2"].map(|id| CatalogItem {
            item_id: id.to_string(),
            upc: format!("upc-{id}"),
            name: format!("Item {id}"),
            unit_price: Money::from_cents(100),
            available_units: 5,
        }))
    }

    #[tokio::test]
    async fn reverses_in_reverse_order() {
        let inventory = inventory();
        let done = vec![
            Adjustment::new("1", "upc-1", -2),
            Adjustment::new("2", "upc-2", -3),
        ];

        let outcome = compensate(&inventory, &done).await;

        assert!(matches!(outcome, CompensationOutcome::Succeeded { .. }));
        assert_eq!(
            inventory.adjustments(),
            vec![("2".to_string(), 3), ("1".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn keeps_going_after_a_failed_reversal() {
        let inventory = inventory();
        inventory.fail_adjust_call(1);
        let done = vec![
            Adjustment::new("1", "upc-1", -2),
            Adjustment::new("2", "upc-2", -3),
        ];

        let outcome = compensate(&inventory, &done).await;

        assert_eq!(outcome.applied(), &[Adjustment::new("1", "upc-1", 2)]);
        assert_eq!(outcome.failed(), &[Adjustment::new("2", "upc-2", 3)]);
        assert!(matches!(outcome, CompensationOutcome::Partial { .. }));
    }

    #[tokio::test]
    async fn nothing_to_undo_succeeds() {
        let inventory = inventory();
        let outcome = compensate(&inventory, &[]).await;
        assert_eq!(outcome, CompensationOutcome::Succeeded { applied: vec![] });
        assert_eq!(inventory.adjust_call_count(), 0);
    }

    #[tokio::test]
    async fn every_reversal_failing_is_failed() {
        let inventory = inventory();
        inventory.set_fail_restocks(true);

        let outcome = compensate(&inventory, &[Adjustment::new("1", "upc-1", -1)]).await;
        assert!(matches!(outcome, CompensationOutcome::Failed { ref failed } if failed.len() == 1));
    }
}
