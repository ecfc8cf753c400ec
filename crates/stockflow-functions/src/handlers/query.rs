//! Inventory query API
//!
//! - `GET /items` returns every record
//! - `GET /items/{store}` returns the records of one store

use std::collections::BTreeMap;

use serde_json::{Value, json};

use super::ApiResponse;
use crate::adapters::{InventoryTable, Page};
use crate::error::Result;
use crate::inventory::{Item, item_to_json};

const ITEMS_PATH: &str = "/items";

/// The route a request resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    AllItems,
    Store(String),
    NotFound,
}

impl Route {
    pub fn from_event(event: &Value) -> Self {
        let raw_path = event.get("rawPath").and_then(Value::as_str).unwrap_or("/");
        let store = event
            .pointer("/pathParameters/store")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());

        match store {
            Some(store) => Route::Store(store.to_string()),
            None if raw_path.trim_end_matches('/') == ITEMS_PATH => Route::AllItems,
            None => Route::NotFound,
        }
    }
}

pub fn cors_headers() -> BTreeMap<String, String> {
    [
        ("Content-Type", "application/json"),
        ("Access-Control-Allow-Origin", "*"),
        ("Access-Control-Allow-Methods", "GET,OPTIONS"),
        ("Access-Control-Allow-Headers", "Content-Type"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn respond(status_code: u16, body: &Value) -> ApiResponse {
    ApiResponse {
        status_code,
        headers: cors_headers(),
        body: body.to_string(),
    }
}

/// Follow continuation keys until the last page
async fn collect_pages<F, Fut>(mut fetch: F) -> Result<Vec<Item>>
where
    F: FnMut(Option<Item>) -> Fut,
    Fut: Future<Output = Result<Page>>,
{
    let mut items = Vec::new();
    let mut start = None;
    loop {
        let page = fetch(start.take()).await?;
        items.extend(page.items);
        match page.next {
            Some(next) => start = Some(next),
            None => return Ok(items),
        }
    }
}

async fn fetch(route: &Route, table: &dyn InventoryTable) -> Result<Option<Vec<Item>>> {
    match route {
        Route::AllItems => collect_pages(|start| table.scan_page(start)).await.map(Some),
        Route::Store(store) => collect_pages(|start| table.query_page(store, start))
            .await
            .map(Some),
        Route::NotFound => Ok(None),
    }
}

pub async fn handle_query(event: &Value, table: &dyn InventoryTable) -> ApiResponse {
    let route = Route::from_event(event);
    tracing::info!("Query route: {:?}", route);

    match fetch(&route, table).await {
        Ok(Some(items)) => {
            let body = Value::Array(items.iter().map(item_to_json).collect());
            respond(200, &body)
        }
        Ok(None) => respond(404, &json!({"error": "Route not found"})),
        Err(e) => {
            tracing::error!("Table query failed: {}", e);
            respond(500, &json!({"error": format!("Internal server error: {}", e)}))
        }
    }
}
