//! REST price feed
//!
//! Fetches USD quotes for a symbol from a CoinMarketCap-style endpoint.
//! Quotes are cached briefly so several sections asking for the same symbol
//! in one refresh hit the API once.
//!
//! API: GET <base>?symbols=SNX
//! {"data": {"SNX": {"quote": {"USD": {"price": ..., "volume_24h": ...}}}}}

use async_trait::async_trait;
use eyre::{eyre, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::currency::CurrencyKey;

// ============================================
// CONSTANTS
// ============================================

/// Cache duration for quotes
const CACHE_DURATION_SECS: u64 = 30;

/// Header carrying the API key, if one is configured
const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

// ============================================
// API RESPONSE TYPES
// ============================================

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    data: Option<HashMap<String, QuoteEntry>>,
    status: Option<ResponseStatus>,
}

#[derive(Debug, Deserialize)]
struct ResponseStatus {
    error_code: Option<i64>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuoteEntry {
    quote: HashMap<String, UsdQuote>,
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    price: Option<f64>,
    volume_24h: Option<f64>,
    market_cap: Option<f64>,
    percent_change_24h: Option<f64>,
}

// ============================================
// QUOTE
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    pub symbol: CurrencyKey,
    pub price: f64,
    pub volume_24h: Option<f64>,
    pub market_cap: Option<f64>,
    pub percent_change_24h: Option<f64>,
}

#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn quote(&self, symbol: &CurrencyKey) -> Result<PriceQuote>;

    /// Drop any quotes held by the feed itself
    async fn clear(&self) {}
}

/// Pull one symbol's USD quote out of a response body
pub fn parse_quote(body: &str, symbol: &CurrencyKey) -> Result<PriceQuote> {
    let response: QuoteResponse = serde_json::from_str(body)?;

    if let Some(status) = response.status {
        if let Some(code) = status.error_code.filter(|c| *c != 0) {
            return Err(eyre!(
                "price API error {}: {}",
                code,
                status.error_message.unwrap_or_default()
            ));
        }
    }

    let entry = response
        .data
        .as_ref()
        .and_then(|d| d.get(symbol.as_str()))
        .ok_or_else(|| eyre!("no quote for {} in response", symbol))?;

    let usd = entry
        .quote
        .get("USD")
        .ok_or_else(|| eyre!("no USD quote for {}", symbol))?;

    let price = usd
        .price
        .filter(|p| p.is_finite())
        .ok_or_else(|| eyre!("USD quote for {} has no price", symbol))?;

    Ok(PriceQuote {
        symbol: symbol.clone(),
        price,
        volume_24h: usd.volume_24h,
        market_cap: usd.market_cap,
        percent_change_24h: usd.percent_change_24h,
    })
}

// ============================================
// HTTP FEED
// ============================================

#[derive(Debug, Clone)]
struct CachedQuote {
    quote: PriceQuote,
    fetched_at: Instant,
}

impl CachedQuote {
    fn is_stale(&self) -> bool {
        self.fetched_at.elapsed() > Duration::from_secs(CACHE_DURATION_SECS)
    }
}

pub struct RestPriceFeed {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    cache: Arc<RwLock<HashMap<CurrencyKey, CachedQuote>>>,
}

impl RestPriceFeed {
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| eyre!("failed to create HTTP client: {}", e))?;

        Ok(Self {
            http_client,
            base_url,
            api_key,
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    async fn fetch_quote(&self, symbol: &CurrencyKey) -> Result<PriceQuote> {
        let mut request = self
            .http_client
            .get(&self.base_url)
            .query(&[("symbols", symbol.as_str())]);

        if let Some(ref key) = self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let body = request.send().await?.error_for_status()?.text().await?;
        let quote = parse_quote(&body, symbol)?;

        debug!("💲 {} = ${:.4} (24h vol: {:?})", symbol, quote.price, quote.volume_24h);
        Ok(quote)
    }
}

#[async_trait]
impl PriceFeed for RestPriceFeed {
    async fn quote(&self, symbol: &CurrencyKey) -> Result<PriceQuote> {
        // Check cache first
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(symbol) {
                if !cached.is_stale() {
                    trace!("Using cached quote for {}", symbol);
                    return Ok(cached.quote.clone());
                }
            }
        }

        let quote = self.fetch_quote(symbol).await?;

        {
            let mut cache = self.cache.write().await;
            cache.insert(
                symbol.clone(),
                CachedQuote {
                    quote: quote.clone(),
                    fetched_at: Instant::now(),
                },
            );
        }

        Ok(quote)
    }

    async fn clear(&self) {
        let mut cache = self.cache.write().await;
        let dropped = cache.len();
        cache.clear();
        trace!("Dropped {} cached quotes", dropped);
    }
}

// ============================================
// TEST SUPPORT
// ============================================
