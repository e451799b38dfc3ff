//! Diagnostic tool - Check environment and source reachability
//!
//! Run with: cargo run --bin diagnose

use alloy_provider::{Provider, ProviderBuilder};
use color_eyre::eyre::Result;
use std::env;
use std::time::Duration;

#[path = "../endpoints.rs"]
mod endpoints;

/// Shortens long values (URLs with embedded keys) to their head and tail
fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 50 {
        let head: String = chars[..30].iter().collect();
        let tail: String = chars[chars.len() - 15..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        value.to_string()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    println!("🔍 SYNTH STATS DIAGNOSTIC CHECK\n");

    // Load .env
    dotenvy::dotenv().ok();

    println!("═══════════════════════════════════════════════════");
    println!("                  CONFIGURATION                     ");
    println!("═══════════════════════════════════════════════════\n");

    let checks = [
        ("CHAIN_ID", "1", "Network the contract addresses belong to"),
        ("MIN_AMOUNT_TO_COVER", "10", "Smallest liquidation shortfall listed (USD)"),
        ("MIN_COLLATERAL", "1", "Smallest flagged collateral listed (SNX)"),
        ("SUBGRAPH_MAX_ENTITIES", "5000", "Cap on paged subgraph reads"),
        ("QUERY_RETRIES", "3", "Transport retries per query"),
        ("MAX_RELOAD_ATTEMPTS", "2", "Section reloads on bad data"),
        ("FIRST_RETRY_DELAY_MS", "3000", "Delay before the first reload"),
        ("RETRY_DELAY_MS", "5000", "Delay before later reloads"),
        ("HTTP_TIMEOUT_SECS", "10", "Timeout for subgraph and price requests"),
    ];

    for (key, default, desc) in checks {
        let value = env::var(key).unwrap_or_else(|_| default.to_string());
        let is_default = env::var(key).is_err();
        let marker = if is_default { "(default)" } else { "(from .env)" };
        println!("  {}: {} {}", key, value, marker);
        println!("    └─ {}\n", desc);
    }

    println!("═══════════════════════════════════════════════════");
    println!("                    SOURCES                         ");
    println!("═══════════════════════════════════════════════════\n");

    let (rpc, origin) = endpoints::rpc_url_from_env();
    println!("  RPC: {} {}", mask(&rpc), origin);

    for key in [
        "SUBGRAPH_URL",
        "RATES_SUBGRAPH_URL",
        "PRICE_API_URL",
        "SYNTHETIX_ADDRESS",
        "SYSTEM_SETTINGS_ADDRESS",
        "EXCHANGE_RATES_ADDRESS",
        "SYNTHETIX_STATE_ADDRESS",
    ] {
        match env::var(key) {
            Ok(value) => println!("  {}: {} (from .env)", key, mask(&value)),
            Err(_) => println!("  {}: (default)", key),
        }
    }

    let price_key = env::var("PRICE_API_KEY").is_ok();
    println!("  PRICE_API_KEY: {}", if price_key { "✅ Set" } else { "❌ Not set" });

    println!("\n═══════════════════════════════════════════════════");
    println!("                  CONNECTIVITY                      ");
    println!("═══════════════════════════════════════════════════\n");

    match rpc.parse() {
        Ok(url) => {
            let provider = ProviderBuilder::new().connect_http(url);
            match tokio::time::timeout(Duration::from_secs(10), provider.get_chain_id()).await {
                Ok(Ok(chain_id)) => println!("  RPC: ✅ reachable (chain id {})", chain_id),
                Ok(Err(e)) => println!("  RPC: ❌ {}", e),
                Err(_) => println!("  RPC: ❌ no answer within 10s"),
            }
        }
        Err(e) => println!("  RPC: ❌ not a URL ({})", e),
    }

    if !price_key {
        println!("\n  ⚠️  Without PRICE_API_KEY the price API will likely reject requests;");
        println!("     the overview, staking and liquidation sections need it.");
    }

    println!("\n✅ Diagnostic complete!\n");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_keeps_short_values() {
        assert_eq!(mask("https://eth.llamarpc.com"), "https://eth.llamarpc.com");
    }

    #[test]
    fn test_mask_splits_on_char_boundaries() {
        let value = "é".repeat(60);
        let masked = mask(&value);
        assert_eq!(masked, format!("{}...{}", "é".repeat(30), "é".repeat(15)));
    }
}
