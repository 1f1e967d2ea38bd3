use std::env;

use crate::error::SetupError;
use crate::instrument::InstrumentCode;

pub const STOCKS_VAR: &str = "TWSE_STOCKS";

pub struct Config {
    pub codes: Vec<InstrumentCode>,
}

impl Config {
    pub fn from_env() -> Result<Config, SetupError> {
        let raw = env::var(STOCKS_VAR).map_err(|_| SetupError::MissingVariable(STOCKS_VAR))?;
        Ok(Config {
            codes: parse_codes(&raw)?,
        })
    }
}

/// Splits a comma-separated list such as `"2330, 0050,tw00"`, dropping blanks.
pub fn parse_codes(raw: &str) -> Result<Vec<InstrumentCode>, SetupError> {
    let codes: Vec<_> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(InstrumentCode::new)
        .collect();
    if codes.is_empty() {
        return Err(SetupError::NoInstruments);
    }
    Ok(codes)
}
