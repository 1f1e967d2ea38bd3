use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, REFERER},
    redirect::Policy,
    Client, Url,
};
use serde_json::Value as JsonValue;

use super::datasource::{QuoteRecord, QuoteSource};
use crate::instrument::InstrumentCode;

pub const TWSE_HOST: &str = "mis.twse.com.tw";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36";
const BODY_EXCERPT_CHARS: usize = 150;

/// TWSE MIS real-time quotes.
///
/// The MIS host serves a certificate chain that fails verification, so the
/// client skips certificate checks. That client is owned here and never
/// follows a redirect off the host it was built for.
pub struct TwseQuoteSource {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl TwseQuoteSource {
    pub fn new() -> Result<TwseQuoteSource> {
        TwseQuoteSource::with_base_url(&format!("https://{}", TWSE_HOST), REQUEST_TIMEOUT)
    }

    fn with_base_url(base_url: &str, timeout: Duration) -> Result<TwseQuoteSource> {
        let host = Url::parse(base_url)?
            .host_str()
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("no host in {}", base_url))?;
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json,text/javascript,*/*;q=0.01"),
        );
        headers.insert(REFERER, HeaderValue::from_static("https://mis.twse.com.tw/"));
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .danger_accept_invalid_certs(true)
            .redirect(Policy::custom(move |attempt| {
                if attempt.url().host_str() == Some(host.as_str()) && attempt.previous().len() < 5 {
                    attempt.follow()
                } else {
                    attempt.stop()
                }
            }))
            .build()?;
        Ok(TwseQuoteSource {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout,
        })
    }

    fn quote_url(&self, code: &InstrumentCode) -> String {
        format!(
            "{}/stock/api/getStockInfo.jsp?ex_ch=tse_{}.tw&json=1&delay=0",
            self.base_url,
            code.query_symbol()
        )
    }

    async fn run_query(&self, code: &InstrumentCode) -> Result<Option<QuoteRecord>> {
        let resp_payload = match self
            .client
            .get(&self.quote_url(code))
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if e.is_connect() && !e.is_timeout() => return Err(e.into()),
            Err(e) => {
                warn!("TWSE request for {} failed: {}", code, e);
                return Ok(None);
            }
        };
        let status = resp_payload.status();
        if !status.is_success() {
            warn!("TWSE HTTP {} for {}", status, code);
            return Ok(None);
        }
        let body = match resp_payload.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("TWSE body for {} could not be read: {}", code, e);
                return Ok(None);
            }
        };
        Ok(parse_body(code, &body))
    }
}

#[async_trait]
impl QuoteSource for TwseQuoteSource {
    async fn fetch_quote(&self, code: &InstrumentCode) -> Result<Option<QuoteRecord>> {
        info!("Querying TWSE {} as {}", code, code.query_symbol());
        self.run_query(code).await
    }
}

/// Picks the first `msgArray` item out of a MIS response body.
pub fn parse_body(code: &InstrumentCode, body: &str) -> Option<QuoteRecord> {
    let response: JsonValue = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(_) => {
            let excerpt: String = body.chars().take(BODY_EXCERPT_CHARS).collect();
            error!("TWSE JSON decode error ({}): {}", code, excerpt);
            return None;
        }
    };
    let item = match response["msgArray"].as_array().and_then(|items| items.first()) {
        Some(item) if item.as_object().map_or(true, |o| o.is_empty()) => {
            debug!("TWSE returned an empty item for {}", code);
            return None;
        }
        Some(item) => item,
        None => {
            debug!("TWSE returned no items for {}", code);
            return None;
        }
    };
    match serde_json::from_value::<QuoteRecord>(item.clone()) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("TWSE item for {} is malformed: {}", code, e);
            None
        }
    }
}
