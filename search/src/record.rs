//! Tender records as stored in a partition, and their lenient raw feed form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SearchError};

/// One procurement tender.
///
/// This is the exact shape persisted in a partition's record table, so
/// every field round-trips losslessly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenderRecord {
    pub id: i64,
    pub title: String,
    pub procurement_type: String,
    pub entity: String,
    pub sector: String,
    pub financial_year: String,
    /// Free-form date text, possibly malformed.
    pub deadline: String,
    pub estimated_value: Option<f64>,
}

/// A tender as it arrives from the source feed.
///
/// Every field is optional and loosely typed; [`TenderRecord::try_from`]
/// normalizes it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTender {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub title: Option<Value>,
    #[serde(default)]
    pub procurement_type: Option<Value>,
    #[serde(default)]
    pub entity: Option<Value>,
    #[serde(default)]
    pub sector: Option<Value>,
    #[serde(default)]
    pub financial_year: Option<Value>,
    #[serde(default)]
    pub deadline: Option<Value>,
    #[serde(default)]
    pub estimated_value: Option<Value>,
}

fn text(value: Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    }
}

/// A finite amount; `"NaN"`, `"inf"` and the like are treated as missing.
fn amount(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
            cleaned.parse().ok()
        }
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn integer(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl TryFrom<RawTender> for TenderRecord {
    type Error = SearchError;

    fn try_from(raw: RawTender) -> Result<Self> {
        let id = integer(raw.id.as_ref()).ok_or_else(|| {
            SearchError::InvalidRecord(format!(
                "missing or non-integer id: {}",
                text(raw.id.clone())
            ))
        })?;

        Ok(Self {
            id,
            estimated_value: amount(raw.estimated_value.as_ref()),
            title: text(raw.title),
            procurement_type: text(raw.procurement_type),
            entity: text(raw.entity),
            sector: text(raw.sector),
            financial_year: text(raw.financial_year),
            deadline: text(raw.deadline),
        })
    }
}
