use std::fmt;

use serde::Serialize;

/// Code the user configures for the TAIEX broad-market index.
pub const INDEX_ALIAS: &str = "tw00";
/// Symbol the TWSE MIS endpoint knows the index by.
pub const INDEX_SYMBOL: &str = "t00";

/// Normalized instrument key: trimmed and lowercased.
///
/// The key keeps the configured spelling (`tw00` stays `tw00`); the remap to
/// the upstream index symbol only happens in [`InstrumentCode::query_symbol`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct InstrumentCode(String);

impl InstrumentCode {
    pub fn new(raw: &str) -> InstrumentCode {
        InstrumentCode(raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn query_symbol(&self) -> &str {
        if self.0 == INDEX_ALIAS {
            INDEX_SYMBOL
        } else {
            &self.0
        }
    }

    pub fn is_index(&self) -> bool {
        self.query_symbol() == INDEX_SYMBOL
    }

    pub fn unit_of_measurement(&self) -> &'static str {
        if self.is_index() {
            "points"
        } else {
            "TWD"
        }
    }

    pub fn label(&self) -> String {
        format!("{} 股價", self.0.to_uppercase())
    }
}

impl fmt::Display for InstrumentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
