//! Inventory rows and table item values

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::{FunctionError, Result};

pub const STORE_ATTR: &str = "Store";
pub const ITEM_ATTR: &str = "Item";
pub const COUNT_ATTR: &str = "Count";

/// One stock level: partition key `Store`, sort key `Item`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    #[serde(rename = "Store")]
    pub store: String,
    #[serde(rename = "Item")]
    pub item: String,
    #[serde(rename = "Count")]
    pub count: u64,
}

impl InventoryRecord {
    pub fn new(store: impl Into<String>, item: impl Into<String>, count: u64) -> Self {
        Self {
            store: store.into(),
            item: item.into(),
            count,
        }
    }

    pub fn to_item(&self) -> Item {
        BTreeMap::from([
            (STORE_ATTR.to_string(), AttrValue::String(self.store.clone())),
            (ITEM_ATTR.to_string(), AttrValue::String(self.item.clone())),
            (COUNT_ATTR.to_string(), AttrValue::Number(self.count.to_string())),
        ])
    }

    pub fn from_item(item: &Item) -> Result<Self> {
        let text = |name: &str| match item.get(name) {
            Some(AttrValue::String(s)) => Ok(s.clone()),
            _ => Err(FunctionError::InvalidRecord(format!("missing string attribute {}", name))),
        };
        let count = match item.get(COUNT_ATTR) {
            Some(AttrValue::Number(n)) => n
                .parse()
                .map_err(|_| FunctionError::InvalidRecord(format!("bad count '{}'", n)))?,
            _ => 0,
        };
        Ok(Self {
            store: text(STORE_ATTR)?,
            item: text(ITEM_ATTR)?,
            count,
        })
    }
}

/// Attribute value as the table stores it
///
/// Numbers are kept as the platform's decimal text until they are rendered.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    String(String),
    Number(String),
    Bool(bool),
    Null,
    List(Vec<AttrValue>),
    Map(BTreeMap<String, AttrValue>),
}

/// A table item keyed by attribute name
pub type Item = BTreeMap<String, AttrValue>;

impl AttrValue {
    pub fn to_json(&self) -> Value {
        match self {
            AttrValue::String(s) => Value::String(s.clone()),
            AttrValue::Number(n) => normalize_number(n),
            AttrValue::Bool(b) => Value::Bool(*b),
            AttrValue::Null => Value::Null,
            AttrValue::List(values) => Value::Array(values.iter().map(AttrValue::to_json).collect()),
            AttrValue::Map(map) => item_to_json(map),
        }
    }
}

pub fn item_to_json(item: &Item) -> Value {
    Value::Object(item.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}

/// Render decimal text as a JSON integer when it is whole, a float otherwise
///
/// Text that does not parse as a number is returned as a string.
pub fn normalize_number(text: &str) -> Value {
    let trimmed = text.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(i.into());
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            Value::Number((f as i64).into())
        }
        Ok(f) => Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(text.to_string())),
        Err(_) => Value::String(text.to_string()),
    }
}
