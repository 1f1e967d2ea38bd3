use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock},
    time::{Duration, SystemTime},
};

use log::{error, info, warn};
use pretty_duration::pretty_duration;
use tokio::sync::Mutex;

use crate::datasources::{QuoteRecord, QuoteSource};
use crate::error::RefreshError;
use crate::instrument::InstrumentCode;

pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Result of one complete fetch cycle. `None` marks a code with no data.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub fetched_at: SystemTime,
    quotes: BTreeMap<InstrumentCode, Option<QuoteRecord>>,
}

impl Snapshot {
    pub fn new(quotes: BTreeMap<InstrumentCode, Option<QuoteRecord>>) -> Snapshot {
        Snapshot {
            fetched_at: SystemTime::now(),
            quotes,
        }
    }

    /// The item for `code`, or `None` when missing or recorded as no data.
    pub fn item(&self, code: &InstrumentCode) -> Option<&QuoteRecord> {
        self.quotes.get(code).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn quotes(&self) -> &BTreeMap<InstrumentCode, Option<QuoteRecord>> {
        &self.quotes
    }
}

pub struct QuoteCoordinator<S> {
    source: S,
    codes: Vec<InstrumentCode>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    cycle: Mutex<()>,
}

impl<S: QuoteSource> QuoteCoordinator<S> {
    pub fn new(source: S, codes: Vec<InstrumentCode>) -> QuoteCoordinator<S> {
        QuoteCoordinator {
            source,
            codes,
            snapshot: RwLock::new(None),
            cycle: Mutex::new(()),
        }
    }

    pub fn codes(&self) -> &[InstrumentCode] {
        &self.codes
    }

    /// Latest published snapshot; `None` until a cycle has succeeded.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fetches every configured code in order and publishes the result.
    ///
    /// Callers are serialized so two cycles never run at once. The snapshot
    /// is swapped only after every code has been visited, and left alone
    /// when the upstream cannot be reached at all.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, RefreshError> {
        let _cycle = self.cycle.lock().await;
        let mut quotes = BTreeMap::new();
        for code in &self.codes {
            let item = self
                .source
                .fetch_quote(code)
                .await
                .map_err(RefreshError::UpdateFailed)?;
            quotes.insert(code.clone(), item);
        }
        let fresh = Arc::new(Snapshot::new(quotes));
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(fresh.clone());
        Ok(fresh)
    }

    /// Runs [`refresh`](Self::refresh) every [`POLL_INTERVAL`], calling
    /// `publish` after each successful cycle. Returns only on a failure that
    /// cannot be retried.
    pub async fn monitor<F>(&self, mut publish: F)
    where
        F: FnMut(&Snapshot),
    {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; the eager refresh already ran.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match self.refresh().await {
                Ok(snapshot) => {
                    let missing = snapshot.quotes().values().filter(|q| q.is_none()).count();
                    if missing > 0 {
                        warn!("{} of {} codes returned no data", missing, snapshot.len());
                    } else {
                        info!("Refreshed {} codes", snapshot.len());
                    }
                    publish(&snapshot);
                }
                Err(err) => {
                    error!("{}; {}", err, self.staleness());
                    if !err.is_retryable() {
                        return;
                    }
                }
            }
        }
    }

    fn staleness(&self) -> String {
        match self.snapshot() {
            Some(snapshot) => {
                let age = SystemTime::now()
                    .duration_since(snapshot.fetched_at)
                    .map(|d| pretty_duration(&d, None))
                    .unwrap_or_else(|_| "[error]".to_owned());
                format!("keeping snapshot from {} ago", age)
            }
            None => "no snapshot yet".to_owned(),
        }
    }
}
