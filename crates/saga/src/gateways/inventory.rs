//! Inventory gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::Money;
use serde::{Deserialize, Serialize};

use super::GatewayError;

/// Catalog data for one product code, including current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub item_id: String,
    pub upc: String,
    pub name: String,
    pub unit_price: Money,
    pub available_units: u32,
}

/// Access to the catalog and stock counts owned by the inventory service.
#[async_trait]
pub trait InventoryGateway: Send + Sync {
    /// Looks up an item by product code. `None` if the code is unknown.
    async fn lookup_by_code(&self, upc: &str) -> Result<Option<CatalogItem>, GatewayError>;

    /// Adjusts stock by a signed delta and returns the new count.
    ///
    /// The count is clamped at zero by the owning service.
    async fn adjust(&self, item_id: &str, delta: i64) -> Result<u32, GatewayError>;
}

#[async_trait]
impl<T: InventoryGateway + ?Sized> InventoryGateway for Arc<T> {
    async fn lookup_by_code(&self, upc: &str) -> Result<Option<CatalogItem>, GatewayError> {
        (**self).lookup_by_code(upc).await
    }

    async fn adjust(&self, item_id: &str, delta: i64) -> Result<u32, GatewayError> {
        (**self).adjust(item_id, delta).await
    }
}

#[derive(Debug, Default)]
struct InventoryState {
    items: HashMap<String, CatalogItem>,
    adjustments: Vec<(String, i64)>,
    adjust_calls: usize,
    fail_lookups: bool,
    fail_adjust_calls: Vec<usize>,
    fail_restocks: bool,
}

/// In-process inventory used by the binary when no remote inventory is
/// configured, and by tests.
///
/// Every successful adjustment is recorded. Faults can be injected on
/// lookups, on specific adjust calls, or on every positive adjustment.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventory {
    state: Arc<RwLock<InventoryState>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        let inventory = Self::new();
        for item in items {
            inventory.add_item(item);
        }
        inventory
    }

    /// Loads a catalog from a JSON array of items.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogLoadError> {
        let raw = std::fs::read_to_string(path)?;
        let items: Vec<CatalogItem> = serde_json::from_str(&raw)?;
        Ok(Self::with_items(items))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InventoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InventoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_item(&self, item: CatalogItem) {
        self.write().items.insert(item.upc.clone(), item);
    }

    /// Current stock for a product code.
    pub fn available(&self, upc: &str) -> Option<u32> {
        self.read().items.get(upc).map(|item| item.available_units)
    }

    /// Successful adjustments so far, as `(item_id, delta)`.
    pub fn adjustments(&self) -> Vec<(String, i64)> {
        self.read().adjustments.clone()
    }

    /// Number of adjust calls made, including failed ones.
    pub fn adjust_call_count(&self) -> usize {
        self.read().adjust_calls
    }

    pub fn set_fail_lookups(&self, fail: bool) {
        self.write().fail_lookups = fail;
    }

    /// Makes the `n`-th adjust call from now fail (1-based).
    pub fn fail_adjust_call(&self, n: usize) {
        let mut state = self.write();
        let target = state.adjust_calls + n;
        state.fail_adjust_calls.push(target);
    }

    /// Makes every positive adjustment fail until reset.
    pub fn set_fail_restocks(&self, fail: bool) {
        self.write().fail_restocks = fail;
    }
}

/// Returned when a catalog seed file cannot be loaded.
#[derive(Debug, thiserror::Error)]
pub enum CatalogLoadError {
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[async_trait]
impl InventoryGateway for InMemoryInventory {
    async fn lookup_by_code(&self, upc: &str) -> Result<Option<CatalogItem>, GatewayError> {
        let state = self.read();
        if state.fail_lookups {
            return Err(GatewayError::Unavailable("inventory lookup failed".to_string()));
        }
        Ok(state.items.get(upc).cloned())
    }

    async fn adjust(&self, item_id: &str, delta: i64) -> Result<u32, GatewayError> {
        let mut state = self.write();
        state.adjust_calls += 1;

        let call = state.adjust_calls;
        if let Some(pos) = state.fail_adjust_calls.iter().position(|&n| n == call) {
            state.fail_adjust_calls.swap_remove(pos);
            return Err(GatewayError::Unavailable(format!(
                "adjustment of {item_id} failed"
            )));
        }
        if delta > 0 && state.fail_restocks {
            return Err(GatewayError::Unavailable(format!(
                "restock of {item_id} failed"
            )));
        }

        let item = state
            .items
            .values_mut()
            .find(|item| item.item_id == item_id)
            .ok_or_else(|| GatewayError::Rejected(format!("unknown item {item_id}")))?;

        let updated = (i64::from(item.available_units) + delta).clamp(0, i64::from(u32::MAX));
        item.available_units = updated as u32;
        state.adjustments.push((item_id.to_string(), delta));

        Ok(updated as u32)
    }
}
