use anyhow::bail;
use clap::{Parser, Subcommand};
use funding_rate_monitor::{
    config::{ConfigDefaults, MonitorConfig},
    connectors::{ConnectorFactory, Exchange},
    monitor::CycleScheduler,
    notify::TelegramNotifier,
    utils::{logger, metrics},
    Result,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "fr-monitor")]
#[command(about = "Funding-rate spread monitor for Binance/Bybit hedged positions")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = ConfigDefaults::CONFIG_PATH)]
    config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log file path
    #[arg(long, default_value = "logs/fr-monitor.log")]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor positions continuously, or once with --once
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Validate configuration and print it with secrets masked
    Validate,
    /// Check connectivity to both exchanges and the Telegram bot
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    logger::init(&cli.log_level, &cli.log_file)?;

    info!("Starting Funding-Rate Spread Monitor v{}", funding_rate_monitor::VERSION);

    let config = MonitorConfig::load(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config.display());

    match cli.command {
        Commands::Run { once } => run(config, once).await,
        Commands::Validate => validate_config(&config),
        Commands::Check => check_connectivity(config).await,
    }
}

async fn run(config: MonitorConfig, once: bool) -> Result<()> {
    config.validate()?;

    if config.monitoring.enable_metrics {
        metrics::install_prometheus_exporter(&config.monitoring.metrics_listen_addr)?;
        info!("Metrics exporter listening on {}", config.monitoring.metrics_listen_addr);
    }

    let timeout = config.monitor.fetch_timeout();
    let exchanges = &config.exchanges;
    let binance =
        ConnectorFactory::create_connector(Exchange::Binance, &exchanges.binance, timeout)?;
    let bybit = ConnectorFactory::create_connector(Exchange::Bybit, &exchanges.bybit, timeout)?;
    let notifier = Arc::new(TelegramNotifier::new(&config.telegram, timeout)?);

    let mut scheduler = CycleScheduler::new(binance, bybit, notifier, config.monitor.clone());

    if once {
        info!("Running a single cycle");
        let report = scheduler.run_once().await;
        info!(
            pairs = report.rated_pairs.len(),
            errors = report.errors.len(),
            "Single cycle finished"
        );
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, finishing current cycle");
        let _ = shutdown_tx.send(true);
    });

    scheduler.run_forever(shutdown_rx).await;
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM. Never resolves if no handler could be installed.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn validate_config(config: &MonitorConfig) -> Result<()> {
    info!("Validating configuration...");

    match config.validate() {
        Ok(()) => {
            info!("Configuration is valid");
            println!("{}", config.redacted()?);
            println!("Configuration validation passed!");
            Ok(())
        }
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            Err(e)
        }
    }
}

async fn check_connectivity(config: MonitorConfig) -> Result<()> {
    config.validate()?;
    let timeout = config.monitor.fetch_timeout();

    let mut failures = 0;
    for (exchange, exchange_config) in [
        (Exchange::Binance, &config.exchanges.binance),
        (Exchange::Bybit, &config.exchanges.bybit),
    ] {
        let connector = ConnectorFactory::create_connector(exchange, exchange_config, timeout)?;
        match connector.ping().await {
            Ok(()) => println!("  {:<9} OK", exchange),
            Err(e) => {
                failures += 1;
                println!("  {:<9} FAILED: {:#}", exchange, e);
            }
        }
        match connector.fetch_positions().await {
            Ok(positions) => println!("  {:<9} {} open positions", exchange, positions.len()),
            Err(e) => {
                failures += 1;
                println!("  {:<9} FAILED: {}", exchange, e);
            }
        }
    }

    let notifier = TelegramNotifier::new(&config.telegram, timeout)?;
    match notifier.get_me().await {
        Ok(username) => println!("  {:<9} OK (@{})", "telegram", username),
        Err(e) => {
            failures += 1;
            println!("  {:<9} FAILED: {:#}", "telegram", e);
        }
    }

    if failures > 0 {
        bail!("{} connectivity check(s) failed", failures);
    }
    println!("All connectivity checks passed!");
    Ok(())
}
