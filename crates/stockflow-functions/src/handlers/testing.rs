//! In-memory capabilities for handler tests

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::adapters::{AlertPublisher, InventoryTable, ObjectReader, Page};
use crate::error::{FunctionError, Result};
use crate::inventory::{AttrValue, InventoryRecord, Item, STORE_ATTR};

const OFFSET_KEY: &str = "offset";

#[derive(Default)]
pub struct FakeObjects {
    objects: HashMap<(String, String), Vec<u8>>,
}

impl FakeObjects {
    pub fn with(bucket: &str, key: &str, body: &str) -> Self {
        let mut objects = HashMap::new();
        objects.insert((bucket.to_string(), key.to_string()), body.as_bytes().to_vec());
        Self { objects }
    }

    pub fn and(mut self, bucket: &str, key: &str, body: &str) -> Self {
        self.objects
            .insert((bucket.to_string(), key.to_string()), body.as_bytes().to_vec());
        self
    }
}

#[async_trait]
impl ObjectReader for FakeObjects {
    async fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| FunctionError::ObjectRead {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: "NoSuchKey".to_string(),
            })
    }
}

#[derive(Default)]
struct TableState {
    items: Vec<Item>,
    batches: Vec<usize>,
    /// (calls left, records left behind per call)
    unprocessed: (usize, usize),
    failing: bool,
    page_size: Option<usize>,
}

#[derive(Default)]
pub struct FakeTable {
    state: Mutex<TableState>,
}

impl FakeTable {
    pub fn with_items(items: Vec<Item>, page_size: usize) -> Self {
        let table = Self::default();
        {
            let mut state = table.state.lock().unwrap();
            state.items = items;
            state.page_size = Some(page_size);
        }
        table
    }

    /// Leave the last `count` records unprocessed on the next `calls` writes
    pub fn leave_unprocessed(self, calls: usize, count: usize) -> Self {
        self.state.lock().unwrap().unprocessed = (calls, count);
        self
    }

    pub fn failing(self) -> Self {
        self.state.lock().unwrap().failing = true;
        self
    }

    pub fn stored(&self) -> Vec<InventoryRecord> {
        let state = self.state.lock().unwrap();
        state
            .items
            .iter()
            .map(|item| InventoryRecord::from_item(item).unwrap())
            .collect()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state.lock().unwrap().batches.clone()
    }

    fn page(&self, items: Vec<Item>, start: Option<Item>) -> Result<Page> {
        let state = self.state.lock().unwrap();
        if state.failing {
            return Err(FunctionError::Table("ProvisionedThroughputExceeded".to_string()));
        }
        let offset: usize = match start.as_ref().and_then(|k| k.get(OFFSET_KEY)) {
            Some(AttrValue::Number(n)) => n.parse().unwrap(),
            _ => 0,
        };
        let size = state.page_size.unwrap_or(usize::MAX);
        let end = offset.saturating_add(size).min(items.len());
        let next = (end < items.len())
            .then(|| Item::from([(OFFSET_KEY.to_string(), AttrValue::Number(end.to_string()))]));
        Ok(Page {
            items: items[offset..end].to_vec(),
            next,
        })
    }
}

#[async_trait]
impl InventoryTable for FakeTable {
    async fn batch_put(&self, records: &[InventoryRecord]) -> Result<Vec<InventoryRecord>> {
        let mut state = self.state.lock().unwrap();
        if state.failing {
            return Err(FunctionError::Table("AccessDenied".to_string()));
        }
        assert!(records.len() <= crate::adapters::MAX_BATCH_WRITE);
        state.batches.push(records.len());

        let mut keys = std::collections::HashSet::new();
        if !records.iter().all(|r| keys.insert((r.store.as_str(), r.item.as_str()))) {
            return Err(FunctionError::Table(
                "ValidationException: batch contains duplicates".to_string(),
            ));
        }

        let (calls, count) = state.unprocessed;
        let keep = if calls > 0 {
            state.unprocessed.0 -= 1;
            records.len().saturating_sub(count)
        } else {
            records.len()
        };
        state.items.extend(records[..keep].iter().map(InventoryRecord::to_item));
        Ok(records[keep..].to_vec())
    }

    async fn scan_page(&self, start: Option<Item>) -> Result<Page> {
        let items = self.state.lock().unwrap().items.clone();
        self.page(items, start)
    }

    async fn query_page(&self, store: &str, start: Option<Item>) -> Result<Page> {
        let items: Vec<Item> = self
            .state
            .lock()
            .unwrap()
            .items
            .iter()
            .filter(|item| item.get(STORE_ATTR) == Some(&AttrValue::String(store.to_string())))
            .cloned()
            .collect();
        self.page(items, start)
    }
}

#[derive(Default)]
pub struct FakePublisher {
    pub sent: Mutex<Vec<(String, String)>>,
    /// Subjects containing this text fail to publish
    pub fail_on: Option<String>,
}

#[async_trait]
impl AlertPublisher for FakePublisher {
    async fn publish(&self, subject: &str, message: &str) -> Result<()> {
        if let Some(pattern) = &self.fail_on
            && subject.contains(pattern.as_str())
        {
            return Err(FunctionError::Publish("throttled".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), message.to_string()));
        Ok(())
    }
}
