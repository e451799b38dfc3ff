//! Synth Stats - Protocol Statistics Dashboard
//!
//! Run with: cargo run -- --section all --period W
//!
//! Each section fetches its sources in parallel, combines them only when
//! every source answered, and reloads on bad data before giving up.

use alloy_primitives::Address;
use clap::{Parser, ValueEnum};
use color_eyre::eyre::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod currency;
mod dashboard;
mod endpoints;
mod metrics;
mod query;
mod reload;
mod sources;
mod timeseries;
mod units;

use config::Config;
use dashboard::{DashboardContext, NetworkOverview, PriceHistory, StakingOverview, TradingVolume};
use metrics::LiquidationSummary;
use query::AggregateQueryResult;
use reload::{LoadingState, TokioTimer};
use timeseries::Period;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Section {
    Overview,
    Staking,
    Liquidations,
    History,
    Volume,
    All,
}

impl Section {
    fn includes(&self, other: Section) -> bool {
        *self == Section::All || *self == other
    }
}

#[derive(Parser, Debug)]
#[command(name = "synth-stats", version, about = "Protocol statistics from chain, subgraph and price feeds")]
struct Args {
    /// TOML config file (environment is used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Display window: D, W, M or Y
    #[arg(long, default_value = "D")]
    period: Period,

    #[arg(long, value_enum, default_value = "all")]
    section: Section,

    /// Also show the collateralization ratio of this account
    #[arg(long)]
    account: Option<Address>,

    /// Print view-models as JSON instead of tables
    #[arg(long)]
    json: bool,

    /// Accept the first answer even if it is incomplete
    #[arg(long)]
    no_retry: bool,
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" 📊 SYNTH STATS - Protocol Statistics Dashboard").cyan().bold()
    );
    println!(
        "{}",
        style("    Chain Reads | Subgraph History | Price Feeds").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn section_heading(title: &str) {
    println!();
    println!("{}", style(format!("═══ {} ═══", title)).blue().bold());
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn fmt_opt(value: Option<f64>, suffix: &str) -> String {
    match value {
        Some(v) => format!("{:.2}{}", v, suffix),
        None => "-".to_string(),
    }
}

/// Run one section under the reload policy with a spinner while it loads
async fn load_section<T, F, Fut>(
    ctx: &DashboardContext,
    name: &str,
    args: &Args,
    fetch: F,
    is_good: impl Fn(&Option<T>) -> bool,
) -> Option<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = AggregateQueryResult<Option<T>>>,
{
    let bar = spinner(&format!("Loading {}...", name));
    let policy = ctx.config.reload_policy(args.no_retry);
    let outcome = dashboard::load_section(ctx, name, policy, &TokioTimer, fetch, is_good).await;
    bar.finish_and_clear();

    match (outcome.state, outcome.value) {
        (LoadingState::Success, Some(Some(value))) => {
            debug!("{} loaded after {} refetches", name, outcome.refetches);
            Some(value)
        }
        (state, _) => {
            error!("{}: {} after {} refetches", name, state, outcome.refetches);
            if !args.json {
                println!("{} {}", style("✗").red(), style("Error fetching data").red());
            }
            None
        }
    }
}

/// Either prints a section as text or collects it for one JSON document
struct Output {
    json: bool,
    report: Map<String, Value>,
}

impl Output {
    fn heading(&self, title: &str) {
        if !self.json {
            section_heading(title);
        }
    }

    fn emit<T: Serialize>(&mut self, name: &str, value: Option<T>, print: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            let value = match value {
                Some(v) => serde_json::to_value(&v)?,
                None => Value::Null,
            };
            self.report.insert(name.to_string(), value);
        } else if let Some(v) = value {
            print(&v);
        }
        Ok(())
    }
}

fn print_overview(overview: &NetworkOverview, account_ratio: Option<f64>) {
    println!("{} SNX price:            ${:.4}", style("✓").green(), overview.snx_price);
    println!("  SNX supply:           {:.0}", overview.snx_total_supply);
    println!("  SNX market cap:       ${:.0}", overview.snx_market_cap);
    println!("  SNX 24h volume:       ${}", fmt_opt(overview.snx_volume_24h, ""));
    println!("  Total issued synths:  ${:.0}", overview.total_issued_synths);
    println!("  Network C-ratio:      {}", fmt_opt(overview.network_c_ratio, "%"));
    println!("  Target C-ratio:       {}", fmt_opt(overview.target_c_ratio, "%"));
    println!("  Debt ledger entry:    {:.6}", overview.last_debt_ledger_entry);
    if let Some(ratio) = account_ratio {
        println!("  Account C-ratio:      {:.2}%", ratio);
    }
}

fn print_staking(staking: &StakingOverview) {
    for pool in &staking.pools {
        let status = if pool.active {
            style("active").green()
        } else {
            style("ended").yellow()
        };
        println!(
            "  {:<16} APY {:>10}  weekly {:>14}  staked {:>14.2}  [{}]",
            pool.name,
            fmt_opt(pool.apy.map(|a| a * 100.0), "%"),
            fmt_opt(pool.weekly_rewards, ""),
            pool.total_staked,
            status
        );
    }
}

fn print_liquidations(summary: &LiquidationSummary) {
    println!(
        "{} {} accounts flagged, ${:.2} to cover, {:.2} SNX liquidatable",
        style("✓").green(),
        summary.len(),
        summary.amount_to_cover,
        summary.total_liquidatable_snx
    );
    for liquidation in summary.liquidations.iter().take(10) {
        let deadline = liquidation
            .deadline
            .checked_mul(1000)
            .and_then(|ms| timeseries::iso_timestamp(ms).ok())
            .unwrap_or_else(|| liquidation.deadline.to_string());
        println!(
            "  {}  deadline {}  c-ratio {:.2}%  cover ${:.2}  {:.2} SNX",
            style(&liquidation.account).cyan(),
            deadline,
            liquidation.current_ratio * 100.0,
            liquidation.amount_to_cover,
            liquidation.liquidatable_snx
        );
    }
}

fn print_history(history: &PriceHistory) {
    println!(
        "{} {} points at {} ({} window)",
        style("✓").green(),
        history.points.len(),
        history.interval,
        history.period
    );
    if let (Some(first), Some(last)) = (history.points.first(), history.points.last()) {
        println!("  {}  ${:.4}", first.created, first.value);
        println!("  {}  ${:.4}", last.created, last.value);
    }
    println!(
        "  High ${}  Low ${}  Change {}",
        fmt_opt(history.high, ""),
        fmt_opt(history.low, ""),
        fmt_opt(history.change.map(|c| c * 100.0), "%")
    );
}

fn print_volume(volume: &TradingVolume) {
    println!(
        "{} {} exchanges, ${:.2} total",
        style("✓").green(),
        volume.trades,
        volume.total
    );
    let mut assets: Vec<_> = volume.by_asset.iter().collect();
    assets.sort_by(|a, b| b.1.total_cmp(a.1));
    for (asset, usd) in assets.into_iter().take(10) {
        println!("  {:<8} ${:.2}", asset.as_str(), usd);
    }
    for (category, usd) in &volume.by_category {
        println!("  {:<8} ${:.2}", format!("{:?}", category), usd);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("synth_stats=info".parse()?),
        )
        .init();

    let args = Args::parse();

    if !args.json {
        print_banner();
    }

    // Load configuration
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        error!("Please check your .env file");
        return Err(e);
    }

    if !args.json {
        config.print_summary();
    }

    let ctx = DashboardContext::from_config(config)?;
    info!("Loading {:?} for period {}", args.section, args.period);

    let mut out = Output {
        json: args.json,
        report: Map::new(),
    };
    let period = args.period;

    if args.section.includes(Section::Overview) {
        out.heading("NETWORK OVERVIEW");
        let overview = load_section(
            &ctx,
            "overview",
            &args,
            || dashboard::network_overview(&ctx),
            |o| o.as_ref().is_some_and(|o| o.is_complete()),
        )
        .await;

        let account_ratio = match args.account {
            Some(account) => dashboard::account_collateral_ratio(&ctx, account).await.data,
            None => None,
        };
        if out.json && args.account.is_some() {
            out.report.insert("account_c_ratio".to_string(), serde_json::to_value(account_ratio)?);
        }

        out.emit("overview", overview, |o| print_overview(o, account_ratio))?;
    }

    if args.section.includes(Section::Staking) {
        out.heading("STAKING REWARDS");
        let staking = load_section(
            &ctx,
            "staking",
            &args,
            || dashboard::staking_pools(&ctx),
            |s| s.as_ref().is_some_and(|s| s.is_complete()),
        )
        .await;
        out.emit("staking", staking, print_staking)?;
    }

    if args.section.includes(Section::Liquidations) {
        out.heading("LIQUIDATIONS");
        let summary = load_section(
            &ctx,
            "liquidations",
            &args,
            || dashboard::liquidations(&ctx),
            |s| s.is_some(),
        )
        .await;
        out.emit("liquidations", summary, print_liquidations)?;
    }

    if args.section.includes(Section::History) {
        out.heading("SNX PRICE HISTORY");
        let history = load_section(
            &ctx,
            "history",
            &args,
            || dashboard::price_history(&ctx, period),
            |h| h.as_ref().is_some_and(|h| !h.points.is_empty()),
        )
        .await;
        out.emit("history", history, print_history)?;
    }

    if args.section.includes(Section::Volume) {
        out.heading("TRADING VOLUME");
        let volume = load_section(
            &ctx,
            "volume",
            &args,
            || dashboard::trading_volume(&ctx, period),
            |v| v.is_some(),
        )
        .await;
        out.emit("volume", volume, print_volume)?;
    }

    if out.json {
        println!("{}", serde_json::to_string_pretty(&Value::Object(out.report))?);
    } else {
        println!();
    }
    Ok(())
}
