use std::{collections::HashMap, fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::datasources::QuoteRecord;
use crate::instrument::InstrumentCode;
use crate::quote_coordinator::Snapshot;

/// Marker MIS puts in `z` when nothing has traded yet.
const NO_VALUE: &str = "-";
pub const PENDING_TEXT: &str = "更新中";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayValue {
    Price(Decimal),
    /// No valid price has ever been seen for this code.
    Pending,
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayValue::Price(price) => write!(f, "{}", price),
            DisplayValue::Pending => f.write_str(PENDING_TEXT),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteAttributes {
    pub name: Option<String>,
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub volume: Option<String>,
    pub trade_time: Option<String>,
    pub yesterday_close: Option<String>,
    pub change: Option<String>,
    pub change_percent: Option<String>,
    pub last_value: Option<Decimal>,
    pub last_update: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub value: DisplayValue,
    pub available: bool,
    /// `None` when the current snapshot holds no item for the code.
    pub attributes: Option<QuoteAttributes>,
}

/// Last accepted price per code. Entries are only ever overwritten, never
/// removed, so a value survives any number of cycles without data.
#[derive(Debug, Default)]
pub struct LastValueStore {
    values: HashMap<InstrumentCode, Decimal>,
}

impl LastValueStore {
    pub fn new() -> LastValueStore {
        LastValueStore::default()
    }

    pub fn get(&self, code: &InstrumentCode) -> Option<Decimal> {
        self.values.get(code).copied()
    }

    fn accept(&mut self, code: &InstrumentCode, price: Decimal) {
        self.values.insert(code.clone(), price);
    }
}

/// Picks what to show for `code` from the latest snapshot, falling back to
/// the last accepted price and then to [`DisplayValue::Pending`].
///
/// The index and ordinary stocks follow the same policy; only the upstream
/// symbol differs, and that is settled at fetch time.
pub fn resolve(
    code: &InstrumentCode,
    snapshot: Option<&Snapshot>,
    store: &mut LastValueStore,
) -> Resolution {
    let item = snapshot.and_then(|s| s.item(code));
    if let Some(price) = item.and_then(parse_price) {
        store.accept(code, price);
    }
    let value = match store.get(code) {
        Some(price) => DisplayValue::Price(price),
        None => DisplayValue::Pending,
    };
    Resolution {
        value,
        available: item.is_some(),
        attributes: item.map(|item| attributes(item, store.get(code))),
    }
}

fn parse_price(item: &QuoteRecord) -> Option<Decimal> {
    let z = item.last_price.as_deref()?.trim();
    if z.is_empty() || z == NO_VALUE {
        return None;
    }
    Decimal::from_str(z).ok()
}

fn attributes(item: &QuoteRecord, last_value: Option<Decimal>) -> QuoteAttributes {
    QuoteAttributes {
        name: first_present(&item.name, &item.alt_name),
        open: item.open.clone(),
        high: item.high.clone(),
        low: item.low.clone(),
        volume: first_present(&item.volume, &item.alt_volume),
        trade_time: item.trade_time.clone(),
        yesterday_close: item.prev_close.clone(),
        change: item.change.clone(),
        change_percent: item.change_percent.clone(),
        last_value,
        last_update: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

fn first_present(primary: &Option<String>, fallback: &Option<String>) -> Option<String> {
    primary
        .as_ref()
        .filter(|s| !s.is_empty())
        .or_else(|| fallback.as_ref().filter(|s| !s.is_empty()))
        .cloned()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;

    use super::*;

    fn item(z: Option<&str>) -> QuoteRecord {
        QuoteRecord {
            last_price: z.map(str::to_owned),
            ..QuoteRecord::default()
        }
    }

    fn snapshot(entries: Vec<(&str, Option<QuoteRecord>)>) -> Snapshot {
        Snapshot::new(
            entries
                .into_iter()
                .map(|(code, item)| (InstrumentCode::new(code), item))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    fn price(s: &str) -> DisplayValue {
        DisplayValue::Price(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn pending_until_first_valid_price() {
        let code = InstrumentCode::new("2330");
        let mut store = LastValueStore::new();

        let no_snapshot = resolve(&code, None, &mut store);
        assert_eq!(no_snapshot.value, DisplayValue::Pending);
        assert!(!no_snapshot.available);
        assert_eq!(no_snapshot.attributes, None);

        let absent = resolve(&code, Some(&snapshot(vec![("2330", None)])), &mut store);
        assert_eq!(absent.value, DisplayValue::Pending);
        assert!(!absent.available);

        let missing = resolve(&code, Some(&snapshot(vec![("0050", None)])), &mut store);
        assert_eq!(missing.value, DisplayValue::Pending);
        assert!(!missing.available);
    }

    #[test]
    fn mixed_cycle_resolves_each_code_independently() {
        let mut store = LastValueStore::new();
        let cycle = snapshot(vec![("2330", Some(item(Some("605.00")))), ("t00", None)]);

        let tsmc = resolve(&InstrumentCode::new("2330"), Some(&cycle), &mut store);
        assert_eq!(tsmc.value, price("605.00"));
        assert!(tsmc.available);

        let index = resolve(&InstrumentCode::new("t00"), Some(&cycle), &mut store);
        assert_eq!(index.value, DisplayValue::Pending);
        assert!(!index.available);
    }

    #[test]
    fn dash_keeps_pending_but_item_is_available() {
        let code = InstrumentCode::new("t00");
        let mut store = LastValueStore::new();

        let r = resolve(&code, Some(&snapshot(vec![("t00", Some(item(Some("-"))))])), &mut store);

        assert_eq!(r.value, DisplayValue::Pending);
        assert!(r.available);
        assert_eq!(r.attributes.unwrap().last_value, None);
    }

    #[test]
    fn last_value_survives_missing_and_bad_cycles() {
        let code = InstrumentCode::new("2330");
        let mut store = LastValueStore::new();
        resolve(&code, Some(&snapshot(vec![("2330", Some(item(Some("605.00"))))])), &mut store);

        let emptied = resolve(&code, Some(&snapshot(vec![("2330", None)])), &mut store);
        assert_eq!(emptied.value, price("605.00"));
        assert!(!emptied.available);
        assert_eq!(emptied.attributes, None);

        for z in vec![Some("-"), Some("n/a"), Some(""), None] {
            let r = resolve(&code, Some(&snapshot(vec![("2330", Some(item(z)))])), &mut store);
            assert_eq!(r.value, price("605.00"));
            assert!(r.available);
        }

        let lost = resolve(&code, None, &mut store);
        assert_eq!(lost.value, price("605.00"));
        assert!(!lost.available);
    }

    #[test]
    fn newer_price_replaces_last_value() {
        let code = InstrumentCode::new("tw00");
        let mut store = LastValueStore::new();
        resolve(&code, Some(&snapshot(vec![("tw00", Some(item(Some("17000.10"))))])), &mut store);

        let r = resolve(&code, Some(&snapshot(vec![("tw00", Some(item(Some(" 17012.55 "))))])), &mut store);

        assert_eq!(r.value, price("17012.55"));
        assert_eq!(store.get(&code), Some(Decimal::from_str("17012.55").unwrap()));
    }

    #[test]
    fn zero_is_a_real_price() {
        let code = InstrumentCode::new("2330");
        let mut store = LastValueStore::new();
        let r = resolve(&code, Some(&snapshot(vec![("2330", Some(item(Some("0"))))])), &mut store);
        assert_eq!(r.value, DisplayValue::Price(Decimal::ZERO));
    }

    #[test]
    fn attributes_pass_through_with_name_and_volume_fallbacks() {
        let code = InstrumentCode::new("2330");
        let mut store = LastValueStore::new();
        let record = QuoteRecord {
            last_price: Some("605.00".to_owned()),
            open: Some("600.00".to_owned()),
            high: Some("608.00".to_owned()),
            low: Some("599.00".to_owned()),
            volume: None,
            alt_volume: Some("23001".to_owned()),
            trade_time: Some("13:30:00".to_owned()),
            prev_close: Some("598.00".to_owned()),
            change: Some("7.00".to_owned()),
            change_percent: Some("1.17".to_owned()),
            name: Some(String::new()),
            alt_name: Some("2330".to_owned()),
        };

        let r = resolve(&code, Some(&snapshot(vec![("2330", Some(record))])), &mut store);
        let attrs = r.attributes.unwrap();

        assert_eq!(attrs.name.as_deref(), Some("2330"));
        assert_eq!(attrs.volume.as_deref(), Some("23001"));
        assert_eq!(attrs.open.as_deref(), Some("600.00"));
        assert_eq!(attrs.yesterday_close.as_deref(), Some("598.00"));
        assert_eq!(attrs.change_percent.as_deref(), Some("1.17"));
        assert_eq!(attrs.last_value, Some(Decimal::from_str("605.00").unwrap()));
        assert_eq!(attrs.last_update.len(), "2026-01-01 00:00:00".len());
    }

    #[test]
    fn pending_renders_as_placeholder_text() {
        assert_eq!(DisplayValue::Pending.to_string(), "更新中");
        assert_eq!(price("605.00").to_string(), "605.00");
    }
}
