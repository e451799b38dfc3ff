//! Configuration for synth-stats
//!
//! Every endpoint, contract address and threshold the dashboard uses, loaded
//! from the environment (with `.env` support) or a TOML file.

use alloy_primitives::Address;
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::currency::CurrencyKey;
use crate::endpoints::{self, PUBLIC_RPC_URL};
use crate::metrics::{LiquidationThresholds, MIN_AMOUNT_TO_COVER, MIN_COLLATERAL};
use crate::query::QueryOptions;
use crate::reload::{ReloadPolicy, MAX_ATTEMPTS};

// ============================================
// STAKING POOLS
// ============================================

/// One staking-rewards contract shown in the staking section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakingPoolConfig {
    pub name: String,
    pub address: String,
    /// Symbol of the token staked into the pool (priced for APY)
    pub stake_symbol: String,
    /// Symbol of the reward token
    pub reward_symbol: String,
}

impl StakingPoolConfig {
    fn new(name: &str, address: &str, stake_symbol: &str) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
            stake_symbol: stake_symbol.to_string(),
            reward_symbol: "SNX".to_string(),
        }
    }
}

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // ========== Network Settings ==========
    /// JSON-RPC endpoint for contract reads
    pub rpc_url: String,

    /// Chain ID (1 = Ethereum Mainnet)
    pub chain_id: u64,

    // ========== Off-chain Sources ==========
    /// Exchanges and liquidations subgraph
    pub subgraph_url: String,

    /// Price history subgraph (15-minute and daily buckets)
    pub rates_subgraph_url: String,

    /// REST quote endpoint
    pub price_api_url: String,

    pub price_api_key: Option<String>,

    // ========== Contracts ==========
    pub synthetix_address: String,
    pub system_settings_address: String,
    pub exchange_rates_address: String,
    pub synthetix_state_address: String,

    // ========== Liquidations ==========
    /// Smallest USD shortfall worth listing
    pub min_amount_to_cover: f64,

    /// Smallest SNX collateral worth listing
    pub min_collateral: f64,

    /// Cap on entities read from one paged subgraph query
    pub subgraph_max_entities: usize,

    // ========== Queries & Retries ==========
    /// Seconds a cached query result stays fresh
    pub query_stale_secs: u64,

    /// Transport retries per query before it reports an error
    pub query_retries: u32,

    /// Delay before the first section reload
    pub first_retry_delay_ms: u64,

    /// Delay before every later section reload
    pub retry_delay_ms: u64,

    /// Reloads before a section gives up
    pub max_reload_attempts: u32,

    /// Timeout for every HTTP request
    pub http_timeout_secs: u64,

    // ========== Staking ==========
    // Kept last: TOML tables must follow plain keys
    pub staking_pools: Vec<StakingPoolConfig>,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            // Network
            rpc_url: endpoints::rpc_url_from_env().0,
            chain_id: env_or("CHAIN_ID", defaults.chain_id),

            // Off-chain sources
            subgraph_url: env::var("SUBGRAPH_URL").unwrap_or(defaults.subgraph_url),
            rates_subgraph_url: env::var("RATES_SUBGRAPH_URL").unwrap_or(defaults.rates_subgraph_url),
            price_api_url: env::var("PRICE_API_URL").unwrap_or(defaults.price_api_url),
            price_api_key: env::var("PRICE_API_KEY").ok().filter(|k| !k.is_empty()),

            // Contracts
            synthetix_address: env::var("SYNTHETIX_ADDRESS").unwrap_or(defaults.synthetix_address),
            system_settings_address: env::var("SYSTEM_SETTINGS_ADDRESS")
                .unwrap_or(defaults.system_settings_address),
            exchange_rates_address: env::var("EXCHANGE_RATES_ADDRESS")
                .unwrap_or(defaults.exchange_rates_address),
            synthetix_state_address: env::var("SYNTHETIX_STATE_ADDRESS")
                .unwrap_or(defaults.synthetix_state_address),
            staking_pools: defaults.staking_pools,

            // Liquidations
            min_amount_to_cover: env_or("MIN_AMOUNT_TO_COVER", defaults.min_amount_to_cover),
            min_collateral: env_or("MIN_COLLATERAL", defaults.min_collateral),
            subgraph_max_entities: env_or("SUBGRAPH_MAX_ENTITIES", defaults.subgraph_max_entities),

            // Queries & retries
            query_stale_secs: env_or("QUERY_STALE_SECS", defaults.query_stale_secs),
            query_retries: env_or("QUERY_RETRIES", defaults.query_retries),
            first_retry_delay_ms: env_or("FIRST_RETRY_DELAY_MS", defaults.first_retry_delay_ms),
            retry_delay_ms: env_or("RETRY_DELAY_MS", defaults.retry_delay_ms),
            max_reload_attempts: env_or("MAX_RELOAD_ATTEMPTS", defaults.max_reload_attempts),
            http_timeout_secs: env_or("HTTP_TIMEOUT_SECS", defaults.http_timeout_secs),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn default_staking_pools() -> Vec<StakingPoolConfig> {
        vec![
            StakingPoolConfig::new("sUSD Curve", "0xDCB6A51eA3CA5d3Fd898Fd6564757c7aAeC3ca92", "sUSD"),
            StakingPoolConfig::new("sETH Uniswap", "0xC746bc860781DC90BBFCD381d6A058Dc16357F8d", "ETH"),
            StakingPoolConfig::new("iETH", "0x3f27c540ADaE3a9E8c875C61e3B970b559d7F65d", "ETH"),
        ]
    }

    /// Validate configuration before any source is built
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() || self.rpc_url.contains("YOUR_API_KEY") {
            return Err(eyre!("Invalid RPC_URL - set RPC_URL or PROVIDER_API_KEY"));
        }

        for (name, url) in [
            ("SUBGRAPH_URL", &self.subgraph_url),
            ("RATES_SUBGRAPH_URL", &self.rates_subgraph_url),
            ("PRICE_API_URL", &self.price_api_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(eyre!("{} must be an http(s) URL (currently {:?})", name, url));
            }
        }

        for (name, address) in [
            ("SYNTHETIX_ADDRESS", &self.synthetix_address),
            ("SYSTEM_SETTINGS_ADDRESS", &self.system_settings_address),
            ("EXCHANGE_RATES_ADDRESS", &self.exchange_rates_address),
            ("SYNTHETIX_STATE_ADDRESS", &self.synthetix_state_address),
        ] {
            Address::from_str(address).map_err(|e| eyre!("{} is not an address: {}", name, e))?;
        }
        for pool in &self.staking_pools {
            Address::from_str(&pool.address)
                .map_err(|e| eyre!("staking pool {} has a bad address: {}", pool.name, e))?;
            for symbol in [&pool.stake_symbol, &pool.reward_symbol] {
                CurrencyKey::new(symbol).map_err(|e| eyre!("staking pool {}: {}", pool.name, e))?;
            }
        }

        let negative = |v: f64| v.is_nan() || v < 0.0;
        if negative(self.min_amount_to_cover) || negative(self.min_collateral) {
            return Err(eyre!("liquidation thresholds must be non-negative"));
        }
        if self.subgraph_max_entities == 0 {
            return Err(eyre!("SUBGRAPH_MAX_ENTITIES must be at least 1"));
        }
        if self.http_timeout_secs == 0 {
            return Err(eyre!("HTTP_TIMEOUT_SECS must be at least 1"));
        }

        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn liquidation_thresholds(&self) -> LiquidationThresholds {
        LiquidationThresholds {
            min_amount_to_cover: self.min_amount_to_cover,
            min_collateral: self.min_collateral,
        }
    }

    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            stale_time: Duration::from_secs(self.query_stale_secs),
            retries: self.query_retries,
            ..QueryOptions::default()
        }
    }

    pub fn reload_policy(&self, no_retry: bool) -> ReloadPolicy {
        ReloadPolicy {
            max_attempts: self.max_reload_attempts,
            first_delay: Duration::from_millis(self.first_retry_delay_ms),
            delay: Duration::from_millis(self.retry_delay_ms),
            no_retry,
        }
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let set = |v: bool| if v { "✓ Configured" } else { "✗ Not Set" };
        let host = |url: &str| {
            url.split("://")
                .nth(1)
                .and_then(|rest| rest.split('/').next())
                .unwrap_or(url)
                .to_string()
        };

        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║              SYNTH STATS - CONFIGURATION                   ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Chain ID:          {:^40} ║", self.chain_id);
        println!("║ RPC Host:          {:^40} ║", host(&self.rpc_url));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ SOURCES                                                    ║");
        println!("║ • Subgraph:        {:^40} ║", host(&self.subgraph_url));
        println!("║ • Rates Subgraph:  {:^40} ║", host(&self.rates_subgraph_url));
        println!("║ • Price API:       {:^40} ║", host(&self.price_api_url));
        println!("║ • Price API Key:   {:^40} ║", set(self.price_api_key.is_some()));
        println!("║ • Staking Pools:   {:^40} ║", self.staking_pools.len());
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ LIQUIDATIONS                                               ║");
        println!("║ • Min To Cover:    ${:<38.2} ║", self.min_amount_to_cover);
        println!("║ • Min Collateral:  {:<35.2} SNX ║", self.min_collateral);
        println!("║ • Max Entities:    {:^40} ║", self.subgraph_max_entities);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ RETRIES                                                    ║");
        println!("║ • Query Retries:   {:^40} ║", self.query_retries);
        println!("║ • Reload Attempts: {:^40} ║", self.max_reload_attempts);
        println!("║ • Reload Delays:   {:^40} ║",
            format!("{}ms then {}ms", self.first_retry_delay_ms, self.retry_delay_ms)
        );
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: PUBLIC_RPC_URL.to_string(),
            chain_id: 1,
            subgraph_url: "https://api.thegraph.com/subgraphs/name/synthetixio-team/synthetix".to_string(),
            rates_subgraph_url: "https://api.thegraph.com/subgraphs/name/synthetixio-team/synthetix-rates"
                .to_string(),
            price_api_url: "https://pro-api.coinmarketcap.com/v1/cryptocurrency/quotes/latest".to_string(),
            price_api_key: None,
            synthetix_address: "0xC011a73ee8576Fb46F5E1c5751cA3B9Fe0af2a6F".to_string(),
            system_settings_address: "0xD3C8d372bFCd36c2B452639a7ED6ef7dbFDC56F8".to_string(),
            exchange_rates_address: "0xd69b189020EF614796578AfE4d10378c5e7e1138".to_string(),
            synthetix_state_address: "0x4b9Ca5607f1fF8019c1C6A3c2f0CC8de622D5B82".to_string(),
            staking_pools: Self::default_staking_pools(),
            min_amount_to_cover: MIN_AMOUNT_TO_COVER,
            min_collateral: MIN_COLLATERAL,
            subgraph_max_entities: 5000,
            query_stale_secs: 60,
            query_retries: 3,
            first_retry_delay_ms: 3000,
            retry_delay_ms: 5000,
            max_reload_attempts: MAX_ATTEMPTS,
            http_timeout_secs: 10,
        }
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.chain_id, 1);
        assert_eq!(config.min_amount_to_cover, 10.0);
        assert_eq!(config.max_reload_attempts, 2);
        assert!(!config.staking_pools.is_empty());
        assert_ok!(config.validate());
    }

    #[test]
    fn test_reload_policy_from_config() {
        let policy = Config::default().reload_policy(true);
        assert_eq!(policy.first_delay, Duration::from_millis(3000));
        assert_eq!(policy.delay, Duration::from_millis(5000));
        assert!(policy.no_retry);
    }

    #[test]
    fn test_validate_rejects_bad_address() {
        let config = Config {
            exchange_rates_address: "0x1234".to_string(),
            ..Config::default()
        };
        let err = assert_err!(config.validate());
        assert!(err.to_string().contains("EXCHANGE_RATES_ADDRESS"));
    }

    #[test]
    fn test_validate_rejects_placeholder_rpc() {
        let config = Config {
            rpc_url: "https://mainnet.infura.io/v3/YOUR_API_KEY".to_string(),
            ..Config::default()
        };
        assert_err!(config.validate());
    }

    #[test]
    fn test_saved_file_loads_back() {
        let config = Config {
            min_collateral: 5.0,
            ..Config::default()
        };
        let path = env::temp_dir().join(format!("synth-stats-{}.toml", std::process::id()));

        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded.staking_pools, config.staking_pools);
        assert_eq!(loaded.min_collateral, 5.0);
        assert_eq!(loaded.price_api_key, None);
    }
}
