//! Remote collaborators the managers call synchronously.

mod inventory;
mod orders;

pub use inventory::{CatalogItem, CatalogLoadError, InMemoryInventory, InventoryGateway};
pub use orders::{InMemoryOrderSnapshots, OrderSnapshot, OrderSnapshotReader};

use thiserror::Error;

/// Transport or remote failure of a gateway call.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected: {0}")]
    Rejected(String),
}
