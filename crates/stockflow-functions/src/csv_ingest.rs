//! CSV upload parsing
//!
//! Headers are matched case-insensitively against English or Spanish names:
//!
//! | field | accepted headers |
//! |-------|------------------|
//! | store | `store`, `tienda` |
//! | item  | `item`, `articulo`, `artículo` |
//! | count | `count`, `cantidad` |

use std::collections::HashMap;

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::error::Result;
use crate::inventory::InventoryRecord;

const STORE_HEADERS: &[&str] = &["store", "tienda"];
const ITEM_HEADERS: &[&str] = &["item", "articulo", "artículo"];
const COUNT_HEADERS: &[&str] = &["count", "cantidad"];

/// Column positions of each logical field, in alias order
struct Columns {
    store: Vec<usize>,
    item: Vec<usize>,
    count: Vec<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Self {
        let find = |aliases: &[&str]| -> Vec<usize> {
            aliases
                .iter()
                .filter_map(|alias| {
                    headers
                        .iter()
                        .position(|h| h.trim().to_lowercase() == *alias)
                })
                .collect()
        };
        Self {
            store: find(STORE_HEADERS),
            item: find(ITEM_HEADERS),
            count: find(COUNT_HEADERS),
        }
    }

    /// First non-empty value among the alias columns
    fn value<'r>(row: &'r StringRecord, positions: &[usize]) -> Option<&'r str> {
        positions
            .iter()
            .filter_map(|&i| row.get(i))
            .map(str::trim)
            .find(|v| !v.is_empty())
    }
}

/// Parse a count; anything that is not a whole number is 0
///
/// Negative counts are clamped to 0 rather than stored as given, so a
/// record below zero reaches the table (and the low-stock alert) as 0.
pub fn parse_count(raw: Option<&str>) -> u64 {
    match raw.map(str::trim).and_then(|s| s.parse::<i64>().ok()) {
        Some(n) if n > 0 => n as u64,
        _ => 0,
    }
}

/// Parse an uploaded CSV into inventory records
///
/// Rows without a store or an item are dropped. When the same store and
/// item appear more than once, the last row wins.
pub fn parse_inventory_csv(text: &str) -> Result<Vec<InventoryRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let columns = Columns::from_headers(reader.headers()?);

    let mut records = Vec::new();
    let mut dropped = 0usize;

    for row in reader.records() {
        let row = row?;
        let store = Columns::value(&row, &columns.store);
        let item = Columns::value(&row, &columns.item);
        let (Some(store), Some(item)) = (store, item) else {
            dropped += 1;
            continue;
        };

        let count = parse_count(Columns::value(&row, &columns.count));
        records.push(InventoryRecord::new(store, item, count));
    }

    if dropped > 0 {
        tracing::warn!("Dropped {} rows without a store or item", dropped);
    }
    Ok(last_row_wins(records))
}

/// Collapse records sharing a store and item into the last one, kept at the
/// position of the first. A single table batch rejects repeated keys.
pub fn last_row_wins(records: Vec<InventoryRecord>) -> Vec<InventoryRecord> {
    let mut unique: Vec<InventoryRecord> = Vec::with_capacity(records.len());
    let mut positions: HashMap<(String, String), usize> = HashMap::new();

    for record in records {
        let key = (record.store.clone(), record.item.clone());
        match positions.get(&key) {
            Some(&index) => unique[index] = record,
            None => {
                positions.insert(key, unique.len());
                unique.push(record);
            }
        }
    }
    unique
}
