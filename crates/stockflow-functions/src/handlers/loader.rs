//! CSV upload loader
//!
//! Triggered by object-created events on the upload bucket. Reads each
//! uploaded CSV, parses it and writes the rows to the inventory table.

use std::time::Duration;

use serde_json::Value;

use super::FunctionResponse;
use crate::adapters::{InventoryTable, MAX_BATCH_WRITE, ObjectReader};
use crate::csv_ingest::{last_row_wins, parse_inventory_csv};
use crate::error::{FunctionError, Result};
use crate::inventory::InventoryRecord;

/// Attempts per batch before unprocessed items are reported as a failure
const MAX_WRITE_ATTEMPTS: u32 = 5;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLocation {
    pub bucket: String,
    pub key: String,
}

/// Object keys arrive form-encoded (`+` for space, `%XX` escapes)
pub fn decode_object_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Bucket and decoded key of every record in a storage event
pub fn upload_locations(event: &Value) -> Result<Vec<UploadLocation>> {
    let records = event
        .get("Records")
        .and_then(Value::as_array)
        .filter(|records| !records.is_empty())
        .ok_or_else(|| FunctionError::MalformedEvent("no Records".to_string()))?;

    records
        .iter()
        .map(|record| {
            let s3 = record
                .get("s3")
                .ok_or_else(|| FunctionError::MalformedEvent("record without s3".to_string()))?;
            let bucket = s3
                .pointer("/bucket/name")
                .and_then(Value::as_str)
                .ok_or_else(|| FunctionError::MalformedEvent("missing bucket name".to_string()))?;
            let key = s3
                .pointer("/object/key")
                .and_then(Value::as_str)
                .ok_or_else(|| FunctionError::MalformedEvent("missing object key".to_string()))?;
            Ok(UploadLocation {
                bucket: bucket.to_string(),
                key: decode_object_key(key),
            })
        })
        .collect()
}

async fn read_records(reader: &dyn ObjectReader, location: &UploadLocation) -> Result<Vec<InventoryRecord>> {
    let bytes = reader.read_object(&location.bucket, &location.key).await?;
    let text = String::from_utf8(bytes).map_err(|e| FunctionError::ObjectRead {
        bucket: location.bucket.clone(),
        key: location.key.clone(),
        message: format!("not UTF-8: {}", e),
    })?;
    parse_inventory_csv(&text)
}

/// Write records in table-sized batches, retrying unprocessed items
pub async fn write_records(table: &dyn InventoryTable, records: &[InventoryRecord]) -> Result<usize> {
    for chunk in records.chunks(MAX_BATCH_WRITE) {
        let mut pending = chunk.to_vec();
        let mut attempt = 0;
        while !pending.is_empty() {
            if attempt == MAX_WRITE_ATTEMPTS {
                return Err(FunctionError::Unprocessed(pending.len()));
            }
            if attempt > 0 {
                tracing::warn!("Retrying {} unprocessed items", pending.len());
                tokio::time::sleep(RETRY_BASE_DELAY * 2u32.pow(attempt - 1)).await;
            }
            pending = table.batch_put(&pending).await?;
            attempt += 1;
        }
    }
    Ok(records.len())
}

pub async fn handle_upload(event: &Value, reader: &dyn ObjectReader, table: &dyn InventoryTable) -> FunctionResponse {
    let locations = match upload_locations(event) {
        Ok(locations) => locations,
        Err(e) => {
            tracing::error!("Could not parse storage event: {}", e);
            return FunctionResponse::new(400, "Malformed storage event");
        }
    };

    let mut records = Vec::new();
    for location in &locations {
        match read_records(reader, location).await {
            Ok(parsed) => {
                tracing::info!("Read {} rows from s3://{}/{}", parsed.len(), location.bucket, location.key);
                records.extend(parsed);
            }
            Err(e) => {
                tracing::error!("Failed to read upload: {}", e);
                return FunctionResponse::new(
                    500,
                    format!("Failed to read {} from {}", location.key, location.bucket),
                );
            }
        }
    }

    // Uploads in one event may repeat a key
    let records = last_row_wins(records);

    if records.is_empty() {
        tracing::warn!("No valid items found in the upload");
        return FunctionResponse::new(200, "No valid items found");
    }

    match write_records(table, &records).await {
        Ok(written) => {
            tracing::info!("Loaded {} items", written);
            FunctionResponse::new(200, format!("Loaded {} items", written))
        }
        Err(e) => {
            tracing::error!("Failed to write to the table: {}", e);
            FunctionResponse::new(500, format!("Failed to write to the table: {}", e))
        }
    }
}
