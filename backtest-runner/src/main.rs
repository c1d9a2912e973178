mod backtest;
mod report;

use anyhow::{bail, Context, Result};
use backtest::BacktestSession;
use battery_core::{AppConfig, BatteryState, HistoricalPriceSeries, PriceRecord, Side};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use execution_engine::engine::Engine;
use execution_engine::market::DryRunMarket;
use execution_engine::risk::RiskManager;
use log::{info, warn};
use strategy_planner::DayAheadPlanner;

#[derive(Parser, Debug)]
#[command(name = "backtest-runner")]
#[command(about = "Day-ahead battery arbitrage backtests", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[arg(short, long, value_enum, default_value_t = Mode::Backtest)]
    mode: Mode,

    /// Trading day for dry-run mode (defaults to the first day on file).
    #[arg(long)]
    date: Option<NaiveDate>,

    /// First day of the backtest range (defaults to the start of the data).
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day of the backtest range (defaults to the end of the data).
    #[arg(long)]
    to: Option<NaiveDate>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Mode {
    /// Plan and submit one day against a market that never fills.
    DryRun,
    /// Replay the historical price range day by day.
    Backtest,
    /// Live trading (not wired up).
    Live,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let app: AppConfig = config::Config::builder()
        .add_source(config::File::with_name(&cli.config))
        .build()
        .with_context(|| format!("loading configuration from {}", cli.config))?
        .try_deserialize()
        .context("parsing configuration")?;

    let prices = load_prices(&app.data.day_ahead_csv)?;
    info!(
        "Loaded {} price observations across {} days from {}",
        prices.len(),
        prices.dates().len(),
        app.data.day_ahead_csv
    );

    match cli.mode {
        Mode::DryRun => dry_run(&app, &prices, cli.date),
        Mode::Backtest => run_backtest(&app, &prices, cli.from, cli.to),
        Mode::Live => bail!("live trading is not wired up; use dry-run or backtest"),
    }
}

fn load_prices(path: &str) -> Result<HistoricalPriceSeries> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening price history {}", path))?;
    let mut records = Vec::new();
    for row in reader.deserialize::<PriceRecord>() {
        records.push(row.with_context(|| format!("reading price history {}", path))?);
    }
    Ok(HistoricalPriceSeries::from_records(records))
}

/// Plans one day and submits it against a market that accepts everything
/// and fills nothing, to inspect what the planner would do.
fn dry_run(app: &AppConfig, prices: &HistoricalPriceSeries, date: Option<NaiveDate>) -> Result<()> {
    let date = match date.or_else(|| prices.dates().first().copied()) {
        Some(d) => d,
        None => bail!("price history is empty"),
    };
    let curve = prices.day_prices(date);
    if curve.is_empty() {
        bail!("no prices on file for {}", date);
    }

    let battery = BatteryState::from_config(&app.battery)?;
    let plan = DayAheadPlanner::new(app.planner.clone()).plan(&battery, date, &curve);
    let mut engine = Engine::new(
        RiskManager::new(battery, app.risk.clone()),
        Box::new(DryRunMarket),
    );

    println!("Dry-run plan for {} ({} actions):", date, plan.entries.len());
    let mut accepted = 0;
    for entry in &plan.entries {
        let verb = match entry.side {
            Side::Buy => "BUY ",
            Side::Sell => "SELL",
        };
        match engine.submit(backtest::intent_for(date, entry)) {
            Ok(order_id) => {
                accepted += 1;
                println!(
                    "  H{:<2} {} {:>7.3} MWh @ {:>7.2} EUR/MWh  -> order {}",
                    entry.hour + 1,
                    verb,
                    entry.volume_mwh,
                    entry.price_eur_mwh,
                    order_id
                );
            }
            Err(e) => warn!(
                "Planned {} H{} rejected at submission: {}",
                verb,
                entry.hour + 1,
                e
            ),
        }
    }
    println!(
        "{} of {} actions accepted; reserved SOC {:.2} MWh",
        accepted,
        plan.entries.len(),
        engine.soc_mwh()
    );
    Ok(())
}

fn run_backtest(
    app: &AppConfig,
    prices: &HistoricalPriceSeries,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<()> {
    let dates = prices.dates();
    if dates.is_empty() {
        bail!("price history is empty");
    }
    let from = from.unwrap_or(dates[0]);
    let to = to.unwrap_or(dates[dates.len() - 1]);
    if to < from {
        bail!("backtest range is empty: {} to {}", from, to);
    }

    let mut session = BacktestSession::new(app)?;
    let mut history = Vec::new();
    for date in dates.into_iter().filter(|d| (from..=to).contains(d)) {
        history.push(session.run_day(prices, date)?);
    }

    info!(
        "Backtest complete: {} days, final SOC {:.2} MWh",
        history.len(),
        session.soc_mwh()
    );
    report::print_report(&history);
    Ok(())
}
