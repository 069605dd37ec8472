mod console;
mod credentials;
mod menu;
mod orchestrator;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use hop_core::catalog::{Catalog, CatalogError};
use hop_core::config::Config;
use hop_session::interrupt::Interrupt;
use hop_session::SessionDriver;
use hop_telemetry::logging::{init_logging, LogFormat};

use crate::console::StdConsole;
use crate::orchestrator::Orchestrator;

/// gatehop -- pick a server from the inventory and log in to it through the
/// access gateway.
#[derive(Parser)]
#[command(name = "gatehop", version, about)]
struct Cli {
    /// Your gateway user name.
    #[arg(short, long)]
    user: String,

    /// Gateway host name or address.
    #[arg(short, long)]
    server: String,

    /// Server inventory CSV (defaults to the config value, then output.csv).
    #[arg(short, long)]
    csv: Option<PathBuf>,

    /// Config file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Seconds to wait for each gateway prompt.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Log filter, e.g. `debug` or `hop_session=debug,warn`. RUST_LOG wins.
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.general.log_level.clone());
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Human
    };
    init_logging(&level, format);

    // Restore the terminal if a panic lands mid-handoff.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = crossterm::terminal::disable_raw_mode();
        original_hook(panic_info);
    }));

    let csv = cli
        .csv
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.catalog.path));
    let catalog = match Catalog::load(&csv) {
        Ok(catalog) => catalog,
        Err(e @ CatalogError::NotFound(_)) => {
            anyhow::bail!("{e}\nRun the inventory extractor first to generate the CSV file")
        }
        Err(e) => return Err(e).with_context(|| format!("failed to load {}", csv.display())),
    };
    tracing::info!(targets = catalog.len(), path = %csv.display(), "catalog loaded");

    print_header(&cli);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    let result = runtime.block_on(async {
        let interrupt = Interrupt::ctrl_c();
        let driver = SessionDriver::from_config(&config, interrupt.clone());
        let console = StdConsole::new(interrupt);
        Orchestrator::new(&catalog, &driver, console, &cli.user, &cli.server)
            .run()
            .await
    });
    // A prompt abandoned on Ctrl+C may still be parked in a blocking read.
    runtime.shutdown_background();

    let exit = result.context("terminal i/o failed")?;
    tracing::debug!(?exit, "exiting");
    println!("\nBye.");
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_or_default(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load().with_context(|| {
            format!("failed to load config {}", Config::default_path().display())
        })?,
    };

    if let Some(secs) = cli.timeout {
        config.gateway.wait_timeout_secs = secs;
        config.validate().context("invalid --timeout")?;
    }
    Ok(config)
}

fn print_header(cli: &Cli) {
    let rule = "=".repeat(60);
    println!("{rule}");
    println!("gatehop {}", env!("CARGO_PKG_VERSION"));
    println!("User: {}  Gateway: {}", cli.user, cli.server);
    println!("{rule}");
}
