//! SeasonLab CLI: batch backtests, single-ticker inspection, and reports.
//!
//! Commands:
//! - `batch`: backtest many tickers in parallel, update the registry, write the report
//! - `backtest`: backtest one ticker and print every fold
//! - `calendar`: print one ticker's seasonal buy/sell dates for a year
//! - `report`: regenerate the markdown report from the registry

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use seasonlab_core::backtest::{BacktestEngine, BacktestSummary};
use seasonlab_core::calendar::plan_calendar;
use seasonlab_core::data::{parse_ticker_entry, DataSource, HistoryProvider};
use seasonlab_core::seasonality::monthly_windows;
use seasonlab_runner::config::dedup_entries;
use seasonlab_runner::{
    BacktestTask, BatchConfig, BatchOrchestrator, BatchOutcome, MarkdownReport, ProgressEvent,
    Registry, TaskStatus, TickerTask,
};

#[derive(Parser)]
#[command(
    name = "seasonlab",
    about = "SeasonLab CLI: seasonal growth forecasting and backtesting"
)]
struct Cli {
    /// Path to a batch TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data source override.
    #[arg(long, global = true, value_enum)]
    source: Option<SourceArg>,

    /// Hold out only the most recent N testable years.
    #[arg(long, global = true)]
    lookback: Option<usize>,

    /// Backtest as of this date (YYYY-MM-DD); later bars are ignored.
    #[arg(long, global = true)]
    as_of: Option<NaiveDate>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Yahoo,
    Csv,
    Synthetic,
}

impl From<SourceArg> for DataSource {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Yahoo => DataSource::Yahoo,
            SourceArg::Csv => DataSource::Csv,
            SourceArg::Synthetic => DataSource::Synthetic,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest every ticker in parallel and update the registry.
    Batch {
        /// Tickers (plain or "SYM - Company Name"). Defaults to the configured universe.
        tickers: Vec<String>,

        /// Number of concurrent workers.
        #[arg(long)]
        workers: Option<usize>,

        /// Per-worker delay before each ticker, in seconds.
        #[arg(long)]
        delay: Option<f64>,

        /// Registry JSON path.
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Markdown report path.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Backtest one ticker and print each held-out year.
    Backtest {
        ticker: String,
    },
    /// Print a ticker's seasonal trading calendar.
    Calendar {
        ticker: String,

        /// Year for buy dates. Defaults to the current year.
        #[arg(long)]
        buy_year: Option<i32>,

        /// Year for sell dates. Defaults to the buy year.
        #[arg(long)]
        sell_year: Option<i32>,

        /// Exchange holiday (YYYY-MM-DD); repeatable.
        #[arg(long = "holiday")]
        holidays: Vec<NaiveDate>,
    },
    /// Regenerate the markdown report from the registry.
    Report {
        /// Registry JSON path.
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Output path; prints to stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Run date to report on (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => BatchConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => BatchConfig::default(),
    };
    if let Some(source) = cli.source {
        config.data.source = source.into();
    }
    if let Some(years) = cli.lookback {
        config.backtest.lookback_years = Some(years);
    }
    if let Some(date) = cli.as_of {
        config.backtest.reference_date = Some(date);
    }
    config.validate()?;

    match cli.command {
        Commands::Batch {
            tickers,
            workers,
            delay,
            registry,
            report,
        } => {
            if !tickers.is_empty() {
                config.tickers = tickers;
            }
            if let Some(w) = workers {
                config.batch.max_workers = w;
            }
            if let Some(d) = delay {
                config.batch.rate_delay_secs = d;
            }
            if let Some(r) = registry {
                config.batch.registry_path = r;
            }
            if let Some(r) = report {
                config.batch.report_path = r;
            }
            config.validate()?;
            run_batch(&config)
        }
        Commands::Backtest { ticker } => run_backtest(&config, &ticker),
        Commands::Calendar {
            ticker,
            buy_year,
            sell_year,
            holidays,
        } => run_calendar(&config, &ticker, buy_year, sell_year, &holidays),
        Commands::Report {
            registry,
            out,
            date,
        } => run_report(&config, registry, out, date),
    }
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn single_ticker(entry: &str) -> Result<&str> {
    match parse_ticker_entry(entry) {
        Some(t) => Ok(t),
        None => bail!("empty ticker"),
    }
}

// ─── batch ───────────────────────────────────────────────────────────

fn run_batch(config: &BatchConfig) -> Result<()> {
    let tickers = if config.tickers.is_empty() {
        config.resolve_tickers()?
    } else {
        dedup_entries(&config.tickers)
    };
    if tickers.is_empty() {
        bail!("no tickers to process");
    }

    let provider = config.data.build_provider()?;
    let task = BacktestTask::new(provider, BacktestEngine::new(config.backtest));
    let orchestrator = BatchOrchestrator::new(config.batch.max_workers, config.rate_policy());

    println!(
        "Backtesting {} tickers with {} workers ({} data)...",
        tickers.len(),
        orchestrator.max_workers(),
        task.provider().name()
    );

    let print_progress: &dyn Fn(&ProgressEvent) = &|event| {
        let mark = match event.status {
            TaskStatus::Completed => "ok",
            TaskStatus::Failed => "FAILED",
        };
        println!("  [{:5.1}%] {:<16} {mark}", event.percentage, event.ticker);
    };
    let outcome = record_batch(
        config,
        &orchestrator,
        &tickers,
        &task,
        Some(print_progress),
        Local::now().naive_local(),
    )?;

    println!();
    println!(
        "Batch complete. Updated: {}, Failed: {} ({:.1}s)",
        outcome.counts.successful, outcome.counts.failed, outcome.elapsed_secs
    );
    println!("Registry: {}", config.batch.registry_path.display());
    println!("Report:   {}", config.batch.report_path.display());
    info!(
        registry = %config.batch.registry_path.display(),
        report = %config.batch.report_path.display(),
        "outputs written"
    );
    Ok(())
}

/// Load the registry, run the batch, merge the successes, then save the
/// registry and write the report. The registry is read before any task
/// starts.
fn record_batch<T: TickerTask<Output = BacktestSummary>>(
    config: &BatchConfig,
    orchestrator: &BatchOrchestrator,
    tickers: &[String],
    task: &T,
    on_progress: Option<&dyn Fn(&ProgressEvent)>,
    now: NaiveDateTime,
) -> Result<BatchOutcome<BacktestSummary>> {
    let mut registry = Registry::load(&config.batch.registry_path);

    let outcome = orchestrator.run(tickers, task, on_progress)?;
    for err in &outcome.errors {
        eprintln!("Error for {}: {}", err.ticker, err.message);
    }

    registry.merge(&outcome, now);
    registry.save(&config.batch.registry_path)?;

    let report = MarkdownReport {
        registry: &registry,
        run_date: now.date(),
        tested: outcome.counts.successful,
        failures: outcome.counts.failed,
    };
    report
        .write(&config.batch.report_path)
        .with_context(|| format!("writing {}", config.batch.report_path.display()))?;
    Ok(outcome)
}

// ─── backtest ────────────────────────────────────────────────────────

fn run_backtest(config: &BatchConfig, entry: &str) -> Result<()> {
    let ticker = single_ticker(entry)?;
    let provider = config.data.build_provider()?;
    let history = provider.fetch_history(ticker)?;
    if history.is_empty() {
        bail!("no data for {ticker}");
    }

    let summary = BacktestEngine::new(config.backtest).run(&history);
    print_summary(ticker, &summary);
    Ok(())
}

fn print_summary(ticker: &str, summary: &BacktestSummary) {
    println!("=== {ticker} ===");
    if !summary.folds.is_empty() {
        println!(
            "{:>6} {:>12} {:>12} {:>12} {:>9} {:>9}",
            "Year", "Actual", "Median", "SD", "Med err", "SD err"
        );
        for fold in &summary.folds {
            println!(
                "{:>6} {:>12.2} {:>12.2} {:>12.2} {:>8.2}% {:>8.2}%",
                fold.year,
                fold.actual_end_price,
                fold.median_forecast.price_at(fold.target_date),
                fold.sd_forecast.price_at(fold.target_date),
                fold.median_error,
                fold.sd_error
            );
        }
        println!();
    }

    match summary.winner {
        Some(winner) => {
            println!("Winner:       {}", winner.name().to_uppercase());
            println!("Median error: {:.2}%", summary.median_avg_error);
            println!("SD error:     {:.2}%", summary.sd_avg_error);
        }
        None => println!("Winner:       none (no testable years)"),
    }
    println!(
        "Years tested: {} ({:?} confidence)",
        summary.years_tested, summary.confidence
    );
}

// ─── calendar ────────────────────────────────────────────────────────

fn run_calendar(
    config: &BatchConfig,
    entry: &str,
    buy_year: Option<i32>,
    sell_year: Option<i32>,
    holidays: &[NaiveDate],
) -> Result<()> {
    let ticker = single_ticker(entry)?;
    let provider = config.data.build_provider()?;
    let history = provider.fetch_history(ticker)?;
    if history.is_empty() {
        bail!("no data for {ticker}");
    }

    let buy_year = buy_year.unwrap_or_else(|| Local::now().year());
    let sell_year = sell_year.unwrap_or(buy_year);
    let windows = monthly_windows(&history, config.backtest.exclude_outliers);
    let plan = plan_calendar(&windows, buy_year, sell_year, holidays);

    println!("=== {ticker} seasonal calendar ===");
    println!(
        "{:>5} {:>4} {:>4} {:>8}  {:<12} {:<12}",
        "Month", "Buy", "Sell", "Gain", "Buy date", "Sell date"
    );
    for row in &plan {
        let flag = |adjusted: bool| if adjusted { "*" } else { "" };
        println!(
            "{:>5} {:>4} {:>4} {:>7.2}%  {:<12} {:<12}",
            row.month,
            row.window.buy_day,
            row.window.sell_day,
            row.window.gain,
            format!("{}{}", row.buy.date, flag(row.buy.adjusted)),
            format!("{}{}", row.sell.date, flag(row.sell.adjusted)),
        );
    }
    println!("(* moved off a weekend or holiday)");
    Ok(())
}

// ─── report ──────────────────────────────────────────────────────────

fn run_report(
    config: &BatchConfig,
    registry_path: Option<PathBuf>,
    out: Option<PathBuf>,
    date: Option<NaiveDate>,
) -> Result<()> {
    let path = registry_path.unwrap_or_else(|| config.batch.registry_path.clone());
    if !path.exists() {
        bail!("registry not found: {}", path.display());
    }
    let registry = Registry::load(&path);
    let run_date = date.unwrap_or_else(|| Local::now().date_naive());

    // Failures are not persisted; only refreshed entries can be counted.
    let report = MarkdownReport {
        registry: &registry,
        run_date,
        tested: registry.updated_on(run_date).count(),
        failures: 0,
    };

    match out {
        Some(out) => {
            report
                .write(&out)
                .with_context(|| format!("writing {}", out.display()))?;
            println!("Report written to {}", out.display());
        }
        None => print!("{}", report.render()),
    }
    Ok(())
}
