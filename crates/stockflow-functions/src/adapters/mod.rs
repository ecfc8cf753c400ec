//! Platform capabilities the handlers depend on

pub mod aws;

use async_trait::async_trait;

use crate::error::Result;
use crate::inventory::{InventoryRecord, Item};

/// Largest batch a single table write accepts
pub const MAX_BATCH_WRITE: usize = 25;

#[async_trait]
pub trait ObjectReader: Send + Sync {
    async fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
}

/// One page of a scan or query
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Item>,
    /// Key to continue from, when there are more pages
    pub next: Option<Item>,
}

#[async_trait]
pub trait InventoryTable: Send + Sync {
    /// Write up to [`MAX_BATCH_WRITE`] records; returns the ones the table
    /// left unprocessed
    async fn batch_put(&self, records: &[InventoryRecord]) -> Result<Vec<InventoryRecord>>;

    async fn scan_page(&self, start: Option<Item>) -> Result<Page>;

    /// Items of one store (partition)
    async fn query_page(&self, store: &str, start: Option<Item>) -> Result<Page>;
}

#[async_trait]
pub trait AlertPublisher: Send + Sync {
    async fn publish(&self, subject: &str, message: &str) -> Result<()>;
}
