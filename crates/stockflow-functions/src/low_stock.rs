//! Low-stock detection on table change records

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{FunctionError, Result};
use crate::inventory::{COUNT_ATTR, ITEM_ATTR, STORE_ATTR, normalize_number};

/// A count strictly below this is low stock
pub const LOW_STOCK_THRESHOLD: f64 = 5.0;

/// Change-stream batch delivered to the notifier
#[derive(Debug, Default, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<StreamRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamRecord {
    #[serde(rename = "eventName", default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub dynamodb: Option<StreamChange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamChange {
    /// Row after the change, in the typed attribute form (`{"S": ".."}`)
    #[serde(rename = "NewImage", default)]
    pub new_image: Option<HashMap<String, Value>>,
}

impl StreamRecord {
    pub fn is_upsert(&self) -> bool {
        matches!(self.event_name.as_deref(), Some("INSERT") | Some("MODIFY"))
    }

    pub fn new_image(&self) -> Option<&HashMap<String, Value>> {
        self.dynamodb.as_ref().and_then(|c| c.new_image.as_ref())
    }
}

/// Notification for one store and item
#[derive(Debug, Clone, PartialEq)]
pub struct LowStockAlert {
    pub store: String,
    pub item: String,
    /// Count as rendered in the message
    pub count: String,
}

impl LowStockAlert {
    pub fn subject(&self) -> String {
        format!("Low stock alert: {} at {}", self.item, self.store)
    }

    pub fn message(&self) -> String {
        format!(
            "Inventory is running low.\n\n\
             Store: {}\n\
             Item: {}\n\
             Remaining: {}\n\n\
             Please restock.",
            self.store, self.item, self.count
        )
    }
}

/// Decide whether a change record calls for a notification
///
/// Only inserts and modifications with a post-change image qualify. A
/// missing count reads as 0.
pub fn evaluate(record: &StreamRecord) -> Result<Option<LowStockAlert>> {
    if !record.is_upsert() {
        return Ok(None);
    }
    let Some(image) = record.new_image() else {
        tracing::warn!("Change record without a new image, skipping");
        return Ok(None);
    };

    let text = |name: &str| {
        image
            .get(name)
            .and_then(|v| v.get("S"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };
    let (Some(store), Some(item)) = (text(STORE_ATTR), text(ITEM_ATTR)) else {
        return Ok(None);
    };

    let raw_count = match image.get(COUNT_ATTR) {
        None => "0",
        Some(value) => value
            .get("N")
            .and_then(Value::as_str)
            .ok_or_else(|| FunctionError::InvalidRecord(format!("{} is not a number", COUNT_ATTR)))?,
    };
    let count: f64 = raw_count
        .trim()
        .parse()
        .map_err(|_| FunctionError::InvalidRecord(format!("bad count '{}'", raw_count)))?;

    if count < LOW_STOCK_THRESHOLD {
        Ok(Some(LowStockAlert {
            store: store.to_string(),
            item: item.to_string(),
            count: normalize_number(raw_count).to_string(),
        }))
    } else {
        Ok(None)
    }
}
