//! Dashboard sections
//!
//! Responsible for:
//! - Wiring sources, normalization and formulas into one view-model per section
//! - Sharing a single query cache between sections
//! - Reloading a section that came back with bad data
//!
//! Sections take a `DashboardContext` explicitly; nothing here reaches for
//! global state.

pub mod history;
pub mod liquidations;
pub mod overview;
pub mod staking;
pub mod volume;

pub use history::{price_history, PriceHistory};
pub use liquidations::liquidations;
pub use overview::{account_collateral_ratio, network_overview, NetworkOverview};
pub use staking::{staking_pools, StakingOverview};
pub use volume::{trading_volume, TradingVolume};

use chrono::Utc;
use eyre::{Report, Result};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

use crate::config::Config;
use crate::currency::CurrencyKey;
use crate::query::{refetch_all, AggregateQueryResult, Query, QueryCache, QueryKey, QueryOptions, Refetch};
use crate::reload::{ReloadPolicy, Reloaded, Reloader, Timer};
use crate::sources::{
    ContractAddresses, HttpSubgraphClient, PriceFeed, RestPriceFeed, RpcContractReader, SubgraphClient,
    SynthetixContracts,
};

/// Everything a section needs to fetch and compute
#[derive(Clone)]
pub struct DashboardContext {
    pub config: Config,
    pub contracts: SynthetixContracts,
    pub subgraph: Arc<dyn SubgraphClient>,
    pub prices: Arc<dyn PriceFeed>,
    pub cache: QueryCache,
    pub options: QueryOptions,
    now: Option<i64>,
    /// Handles built since the last reload, refetched together on the next one
    issued: Arc<Mutex<Vec<Box<dyn Refetch>>>>,
}

impl DashboardContext {
    pub fn new(
        config: Config,
        contracts: SynthetixContracts,
        subgraph: Arc<dyn SubgraphClient>,
        prices: Arc<dyn PriceFeed>,
    ) -> Self {
        let options = config.query_options();
        Self {
            config,
            contracts,
            subgraph,
            prices,
            cache: QueryCache::new(),
            options,
            now: None,
            issued: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Production wiring: JSON-RPC, HTTP subgraph, REST price feed
    pub fn from_config(config: Config) -> Result<Self> {
        let addresses = ContractAddresses::from_config(&config)?;
        let reader = Arc::new(RpcContractReader::new(config.rpc_url.clone()));
        let subgraph = Arc::new(HttpSubgraphClient::new(config.http_timeout())?);
        let prices = Arc::new(RestPriceFeed::new(
            config.price_api_url.clone(),
            config.price_api_key.clone(),
            config.http_timeout(),
        )?);

        Ok(Self::new(
            config,
            SynthetixContracts::new(reader, addresses),
            subgraph,
            prices,
        ))
    }

    /// Pin "now" (unix seconds) for reward-period and window checks
    pub fn with_now(mut self, now: i64) -> Self {
        self.now = Some(now);
        self
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Unix seconds
    pub fn now(&self) -> i64 {
        self.now.unwrap_or_else(|| Utc::now().timestamp())
    }

    /// A query sharing this dashboard's cache and options
    pub fn query<T, F, Fut>(&self, key: QueryKey, fetch: F) -> Query<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let query = Query::new(key, fetch)
            .with_cache(self.cache.clone())
            .with_options(self.options);

        self.issued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Box::new(query.clone()));
        query
    }

    /// USD price of `symbol`; USD-pegged keys are 1 without a request
    pub fn price_query(&self, symbol: CurrencyKey) -> Query<f64> {
        let prices = self.prices.clone();
        self.query(QueryKey::new(["price", symbol.as_str()]), move || {
            let prices = prices.clone();
            let symbol = symbol.clone();
            async move {
                if symbol.is_usd() {
                    return Ok(1.0);
                }
                Ok(prices.quote(&symbol).await?.price)
            }
        })
    }

    /// Forget every cached result, including quotes held by the price feed,
    /// so the next fetch goes to the sources
    pub async fn reset(&self) {
        let dropped = self.cache.invalidate(&QueryKey::new(Vec::<String>::new())).await;
        self.prices.clear().await;
        debug!("Dropped {} cached results", dropped);
    }

    fn take_issued(&self) -> Vec<Box<dyn Refetch>> {
        std::mem::take(&mut *self.issued.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    /// Reset, then refetch every query issued since the last refresh. A
    /// failed refetch is left to the section's own fetch to surface.
    pub async fn refresh(&self) {
        self.reset().await;

        let issued = self.take_issued();
        for query in &issued {
            trace!("Refetching {}", query.key());
        }
        let handles: Vec<&dyn Refetch> = issued.iter().map(|q| q.as_ref()).collect();

        if let Err(e) = refetch_all(&handles).await {
            debug!("Refetch of {} queries stopped early: {}", handles.len(), e);
        }
    }
}

// ============================================
// SECTION RELOAD
// ============================================

/// Build one section under the reload policy. Before every refetch the
/// shared cache and the price feed are cleared and the section's queries are
/// refetched, so a retry really goes back to the sources.
pub async fn load_section<T, F, Fut>(
    ctx: &DashboardContext,
    name: &str,
    policy: ReloadPolicy,
    timer: &dyn Timer,
    fetch: F,
    is_good: impl Fn(&Option<T>) -> bool,
) -> Reloaded<Option<T>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = AggregateQueryResult<Option<T>>>,
{
    // Queries issued by earlier sections are not ours to refetch
    ctx.take_issued();

    let reloader = Reloader::new(name, policy, timer);
    let fetch = &fetch;
    let mut first = true;

    reloader
        .run(
            move || {
                let again = !first;
                first = false;
                async move {
                    if again {
                        ctx.refresh().await;
                    }
                    fetch().await.into_result().map_err(Report::new)
                }
            },
            is_good,
        )
        .await
}

// ============================================
// TEST SUPPORT
// ============================================

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::query::QueryOptions;
    use crate::sources::chain::fake::{addresses, FakeChain};
    use crate::sources::price_feed::fake::FakePriceFeed;
    use crate::sources::subgraph::fake::FakeSubgraph;
    use std::time::Duration;

    pub const NOW: i64 = 1_700_000_000;

    pub fn context(chain: FakeChain, subgraph: FakeSubgraph, prices: FakePriceFeed) -> DashboardContext {
        context_with_feed(chain, subgraph, Arc::new(prices))
    }

    pub fn context_with_feed(chain: FakeChain, subgraph: FakeSubgraph, prices: Arc<dyn PriceFeed>) -> DashboardContext {
        DashboardContext::new(
            Config::default(),
            SynthetixContracts::new(Arc::new(chain), addresses()),
            Arc::new(subgraph),
            prices,
        )
        .with_now(NOW)
        .with_options(QueryOptions {
            stale_time: Duration::from_secs(60),
            retries: 0,
            retry_delay: Duration::ZERO,
        })
    }

    /// Returns immediately; reload delays are not under test here
    pub struct NoSleep;

    #[async_trait::async_trait]
    impl Timer for NoSleep {
        async fn sleep(&self, _duration: Duration) {}
    }
}
