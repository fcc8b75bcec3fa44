//! Construction-year lookup for building tiles.
//!
//! Building tiles carry a batch table with one row per building. Depending on
//! the producer, the construction year is stored under one of several column
//! names, or nested inside a per-building `attributes` JSON blob. The lookup
//! tries a fixed, ordered list of accessors and falls back explicitly; a
//! building without a usable year maps to `0`.

use std::collections::BTreeMap;

use serde_json::Value;

/// Columns holding the year directly, in lookup order.
pub const YEAR_COLUMNS: [&str; 3] = ["bouwjaar", "construction_year", "oorspronkelijkbouwjaar"];

/// Keys inside an `attributes` entry, in lookup order.
pub const ATTRIBUTE_YEAR_KEYS: [&str; 2] = ["oorspronkelijkbouwjaar", "bouwjaar"];

const ATTRIBUTES_COLUMN: &str = "attributes";

/// One batch table column.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchColumn {
    Numbers(Vec<f64>),
    Strings(Vec<String>),
    Json(Vec<Value>),
}

impl BatchColumn {
    fn years(&self) -> Vec<u32> {
        match self {
            BatchColumn::Numbers(values) => values.iter().map(|v| year_from_number(*v)).collect(),
            BatchColumn::Strings(values) => values.iter().map(|v| year_from_str(v)).collect(),
            BatchColumn::Json(values) => values.iter().map(year_from_value).collect(),
        }
    }

    fn entries(&self) -> Vec<Value> {
        match self {
            BatchColumn::Numbers(values) => values.iter().map(|v| Value::from(*v)).collect(),
            BatchColumn::Strings(values) => values.iter().cloned().map(Value::String).collect(),
            BatchColumn::Json(values) => values.clone(),
        }
    }
}

/// A tile's batch table.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchTable {
    /// Decoded property arrays keyed by column name.
    Columns(BTreeMap<String, BatchColumn>),
    /// The raw batch table JSON header.
    Json(Value),
}

impl BatchTable {
    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<BatchColumn> {
        match self {
            BatchTable::Columns(columns) => columns.get(name).cloned(),
            BatchTable::Json(json) => json
                .get(name)
                .and_then(Value::as_array)
                .map(|values| BatchColumn::Json(values.clone())),
        }
    }
}

/// Construction year per batch id, or `None` when the table has no year
/// information at all.
pub fn construction_years(table: &BatchTable) -> Option<Vec<u32>> {
    for name in YEAR_COLUMNS {
        if let Some(column) = table.column(name) {
            return Some(column.years());
        }
    }

    let attributes = table.column(ATTRIBUTES_COLUMN)?;
    Some(attributes.entries().iter().map(year_from_attributes).collect())
}

/// Year of the building with `batch_id`, as read from a vertex attribute.
///
/// Ids are rounded; ids outside the table map to `0`.
pub fn year_for_batch_id(years: &[u32], batch_id: f64) -> u32 {
    let id = batch_id.round();
    if !(id >= 0.0 && id < years.len() as f64) {
        return 0;
    }
    years[id as usize]
}

fn year_from_attributes(entry: &Value) -> u32 {
    let parsed;
    let object = match entry {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(value) => {
                parsed = value;
                &parsed
            }
            Err(_) => return 0,
        },
        other => other,
    };

    ATTRIBUTE_YEAR_KEYS
        .iter()
        .filter_map(|key| object.get(*key))
        .map(year_from_value)
        .find(|year| *year != 0)
        .unwrap_or(0)
}

fn year_from_value(value: &Value) -> u32 {
    match value {
        Value::Number(n) => n.as_f64().map(year_from_number).unwrap_or(0),
        Value::String(s) => year_from_str(s),
        _ => 0,
    }
}

fn year_from_number(value: f64) -> u32 {
    if value.is_finite() && value >= 0.0 && value <= u32::MAX as f64 {
        value.round() as u32
    } else {
        0
    }
}

fn year_from_str(value: &str) -> u32 {
    value.trim().parse::<f64>().map(year_from_number).unwrap_or(0)
}
