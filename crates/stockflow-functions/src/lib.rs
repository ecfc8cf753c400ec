//! StockFlow functions
//!
//! The three request handlers of the inventory stack:
//!
//! - `load_inventory`: loads uploaded CSV files into the inventory table
//! - `get_inventory_api`: serves `GET /items` and `GET /items/{store}`
//! - `notify_low_stock`: publishes an alert when a count drops below 5
//!
//! Handlers work against the capability traits in [`adapters`]; the
//! binaries under `src/bin` bind them to the AWS SDK and the Lambda runtime.

pub mod adapters;
pub mod csv_ingest;
pub mod error;
pub mod handlers;
pub mod inventory;
pub mod low_stock;

pub use error::{FunctionError, Result};
pub use inventory::InventoryRecord;

use tracing_subscriber::EnvFilter;

pub const TABLE_NAME_VAR: &str = "DYNAMO_TABLE_NAME";
pub const TOPIC_ARN_VAR: &str = "SNS_TOPIC_ARN";

/// Table used when `DYNAMO_TABLE_NAME` is not set
pub const DEFAULT_TABLE_NAME: &str = "Inventory";

/// Compact log lines for the function log stream
///
/// The platform timestamps every line and does not render colors.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .compact()
        .init();
}

pub fn table_name_from_env() -> String {
    std::env::var(TABLE_NAME_VAR)
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string())
}
