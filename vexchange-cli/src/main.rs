//! vexchange CLI: replay bar series against scripted order flow.
//!
//! Commands:
//! - `run`: replay one config over CSV or synthetic bars, printing status lines
//! - `batch`: replay several configs over the same bars in parallel
//! - `check-config`: validate a config and print its fingerprint

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use vexchange_core::data::{load_csv, synthetic_bars};
use vexchange_core::script::{run_batch, run_script_with, OrderScript, RunSummary};
use vexchange_core::{Bar, SimConfig, Simulator};

#[derive(Parser)]
#[command(
    name = "vexchange",
    about = "vexchange CLI: deterministic virtual exchange replay"
)]
struct Cli {
    /// Log filter when RUST_LOG is unset (e.g. info, vexchange_core=debug).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Where the bar series comes from.
#[derive(clap::Args)]
struct BarSource {
    /// CSV file with OHLCV columns (plus optional volatility, atr).
    #[arg(long, conflicts_with = "synthetic")]
    bars: Option<PathBuf>,

    /// Generate this many synthetic bars instead of reading a file.
    #[arg(long)]
    synthetic: Option<usize>,

    /// Seed for synthetic bars.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Starting price for synthetic bars.
    #[arg(long, default_value_t = 100.0)]
    start_price: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay one config, printing a JSON status line per snapshot.
    Run {
        #[command(flatten)]
        source: BarSource,

        /// TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// TOML order script.
        #[arg(long)]
        script: Option<PathBuf>,

        /// Print a status line every N ticks (0 prints only the summary).
        #[arg(long, default_value_t = 1)]
        every: usize,
    },
    /// Replay several configs over the same bars and script in parallel.
    Batch {
        #[command(flatten)]
        source: BarSource,

        /// TOML config files, one simulator per file.
        #[arg(long = "config", required = true)]
        configs: Vec<PathBuf>,

        /// TOML order script shared by every run.
        #[arg(long)]
        script: Option<PathBuf>,
    },
    /// Validate a config file and print its fingerprint and normalized form.
    CheckConfig {
        /// TOML config file.
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Run {
            source,
            config,
            script,
            every,
        } => run_cmd(&source, config.as_deref(), script.as_deref(), every),
        Commands::Batch {
            source,
            configs,
            script,
        } => batch_cmd(&source, &configs, script.as_deref()),
        Commands::CheckConfig { config } => check_config_cmd(&config),
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_logging(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .with_context(|| format!("invalid log filter '{default_level}'"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn load_bars(source: &BarSource) -> Result<Vec<Bar>> {
    let bars = match (&source.bars, source.synthetic) {
        (Some(path), _) => {
            load_csv(path).with_context(|| format!("loading bars from {}", path.display()))?
        }
        (None, Some(n)) => {
            if n == 0 {
                bail!("--synthetic needs at least one bar");
            }
            synthetic_bars(n, source.seed, source.start_price)
        }
        (None, None) => bail!("one of --bars or --synthetic is required"),
    };
    tracing::info!(bars = bars.len(), "bar series loaded");
    Ok(bars)
}

fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    match path {
        Some(path) => Ok(SimConfig::from_file(path)?),
        None => Ok(SimConfig::default()),
    }
}

fn load_script(path: Option<&Path>) -> Result<OrderScript> {
    match path {
        Some(path) => Ok(OrderScript::from_file(path)?),
        None => Ok(OrderScript::default()),
    }
}

fn run_cmd(
    source: &BarSource,
    config_path: Option<&Path>,
    script_path: Option<&Path>,
    every: usize,
) -> Result<()> {
    let bars = load_bars(source)?;
    let config = load_config(config_path)?;
    let script = load_script(script_path)?;

    let mut sim = Simulator::new(bars, &config)?;
    let summary = run_script_with(&mut sim, &script, config.fingerprint(), |report, status| {
        if every > 0 && report.clock % every == 0 {
            match serde_json::to_string(status) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "failed to serialize status"),
            }
        }
    })?;

    print_summary(&summary);
    Ok(())
}

fn batch_cmd(source: &BarSource, config_paths: &[PathBuf], script_path: Option<&Path>) -> Result<()> {
    let bars = load_bars(source)?;
    let script = load_script(script_path)?;
    let configs = config_paths
        .iter()
        .map(|path| SimConfig::from_file(path))
        .collect::<Result<Vec<_>, _>>()?;

    let results = run_batch(&bars, &configs, &script);

    let mut failures = 0;
    for (path, result) in config_paths.iter().zip(results) {
        match result {
            Ok(summary) => {
                let line = serde_json::json!({
                    "config": path.display().to_string(),
                    "fingerprint": summary.config_fingerprint,
                    "ticks": summary.ticks,
                    "fills": summary.fills.len(),
                    "margin_breaches": summary.margin_breaches,
                    "final_status": summary.final_status,
                });
                println!("{line}");
            }
            Err(e) => {
                failures += 1;
                eprintln!("Error for {}: {e}", path.display());
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} runs failed", config_paths.len());
    }
    Ok(())
}

fn check_config_cmd(path: &Path) -> Result<()> {
    let config = SimConfig::from_file(path)?;
    println!("fingerprint: {}", config.fingerprint());
    println!();
    print!("{}", config.to_toml()?);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    let status = &summary.final_status;
    eprintln!();
    eprintln!("=== Replay Summary ===");
    eprintln!("Config:           {}", summary.config_fingerprint);
    eprintln!("Ticks:            {}", summary.ticks);
    eprintln!("Submissions:      {}", summary.submissions.len());
    eprintln!("Fills:            {}", summary.fills.len());
    eprintln!("Margin breaches:  {}", summary.margin_breaches);
    eprintln!("Liquidations:     {}", summary.liquidations.len());
    eprintln!("Net position:     {:.6}", status.net_position);
    eprintln!("Cash balance:     {:.2}", status.cash_balance);
    eprintln!("Asset balance:    {:.6}", status.asset_balance);
    if let Some(value) = status.total_asset_value {
        eprintln!("Total value:      {value:.2}");
    }
    eprintln!(
        "Orders:           {} open, {} closed, {} canceled, {} rejected",
        status.open_orders, status.closed_orders, status.canceled_orders, status.rejected_orders
    );
}
