use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::instrument::InstrumentCode;

/// One upstream query per code.
///
/// `Ok(None)` means the upstream had nothing usable for this code; the
/// implementation has already logged why. `Err` is reserved for the
/// transport itself being unreachable, which fails the whole cycle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Sync + Send {
    async fn fetch_quote(&self, code: &InstrumentCode) -> Result<Option<QuoteRecord>>;
}

/// Raw item from the MIS `msgArray`. Every field is the upstream string as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRecord {
    /// Last trade price, `"-"` when there has been no trade.
    #[serde(rename = "z", default, deserialize_with = "lenient_string")]
    pub last_price: Option<String>,
    #[serde(rename = "o", default, deserialize_with = "lenient_string")]
    pub open: Option<String>,
    #[serde(rename = "h", default, deserialize_with = "lenient_string")]
    pub high: Option<String>,
    #[serde(rename = "l", default, deserialize_with = "lenient_string")]
    pub low: Option<String>,
    #[serde(rename = "v", default, deserialize_with = "lenient_string")]
    pub volume: Option<String>,
    #[serde(rename = "m", default, deserialize_with = "lenient_string")]
    pub alt_volume: Option<String>,
    #[serde(rename = "t", default, deserialize_with = "lenient_string")]
    pub trade_time: Option<String>,
    #[serde(rename = "y", default, deserialize_with = "lenient_string")]
    pub prev_close: Option<String>,
    #[serde(rename = "d", default, deserialize_with = "lenient_string")]
    pub change: Option<String>,
    #[serde(rename = "p", default, deserialize_with = "lenient_string")]
    pub change_percent: Option<String>,
    #[serde(rename = "n", default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(rename = "c", default, deserialize_with = "lenient_string")]
    pub alt_name: Option<String>,
}

/// MIS sends strings, but tolerate bare numbers so one odd field does not
/// discard the whole item.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::String(s) => Some(s),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
