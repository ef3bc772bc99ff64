use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use swapbot::api::{Exchange, OkxClient, OkxCredentials, RetryPolicy};
use swapbot::config::{Settings, DEFAULT_CONFIG_PATH};
use swapbot::execution::ExecutionCycle;
use swapbot::models::time::{format_gmt8, parse_gmt8};
use swapbot::models::{AnchorPoint, Direction};
use swapbot::notify::{self, Notifier, ThrottledNotifier};
use swapbot::trendline::{
    export_trendlines, import_trendlines, JsonFileTrendlineStore, NewTrendline, Trendline,
    TrendlineBreakoutMonitor, TrendlineFilter, TrendlinePatch, TrendlineStatus, TrendlineStore,
};
use swapbot::watcher::StochRsiWatcher;

#[derive(Parser)]
#[command(name = "swapbot")]
#[command(about = "Perpetual swap signal bot for OKX", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the live trading cycle
    Trade {
        /// Also run the trendline monitor in the background
        #[arg(long)]
        with_monitor: bool,
    },
    /// Run the trendline breakout monitor only
    Monitor,
    /// Run the StochRSI divergence watcher
    Watch {
        /// Scan once and exit
        #[arg(long)]
        once: bool,
    },
    /// Manage monitored trendlines
    #[command(subcommand)]
    Trendline(TrendlineCommand),
}

#[derive(Subcommand)]
enum TrendlineCommand {
    /// Create an active trendline
    Add {
        #[arg(long)]
        name: String,
        /// Instrument, e.g. SOL-USDT-SWAP
        #[arg(long)]
        symbol: String,
        /// Start bar open time, "YYYY-MM-DD HH:MM:SS" GMT+8
        #[arg(long)]
        start: String,
        #[arg(long)]
        start_price: f64,
        /// End bar open time, "YYYY-MM-DD HH:MM:SS" GMT+8
        #[arg(long)]
        end: String,
        #[arg(long)]
        end_price: f64,
        /// 1 for an upward breakout, -1 for a breakdown
        #[arg(long, allow_hyphen_values = true)]
        direction: i8,
    },
    /// List trendlines (deleted ones only with --status deleted)
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        symbol: Option<String>,
    },
    Show {
        id: Uuid,
    },
    /// Stop alerting on a trendline
    Pause {
        id: Uuid,
    },
    /// Re-arm a trendline after an alert
    Activate {
        id: Uuid,
    },
    Delete {
        id: Uuid,
    },
    /// Evaluate a trendline on fresh data without alerting
    Check {
        id: Uuid,
    },
    /// Show breakout alerts, newest first
    Logs {
        #[arg(long)]
        id: Option<Uuid>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Write all trendlines to a JSON file
    Export {
        path: PathBuf,
    },
    /// Create trendlines from a JSON export
    Import {
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let settings = Settings::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Trade { with_monitor } => run_trade(settings, with_monitor).await,
        Commands::Monitor => run_monitor(settings).await,
        Commands::Watch { once } => run_watch(settings, once).await,
        Commands::Trendline(cmd) => run_trendline(settings, cmd).await,
    }
}

// ============================================================================
// Initialization Functions
// ============================================================================

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("swapbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn create_exchange(settings: &Settings, require_credentials: bool) -> anyhow::Result<Arc<dyn Exchange>> {
    let credentials = OkxCredentials::from_env();
    if credentials.is_none() && require_credentials {
        bail!("OKX_API_KEY, OKX_API_SECRET and OKX_PASSPHRASE must be set for trading");
    }
    if settings.exchange.simulated {
        tracing::info!("🧪 Using OKX demo trading");
    }
    Ok(Arc::new(OkxClient::new(&settings.exchange, credentials)?))
}

fn create_store(settings: &Settings) -> Arc<dyn TrendlineStore> {
    Arc::new(JsonFileTrendlineStore::new(settings.store.trendline_path.clone()))
}

fn create_monitor(
    settings: &Settings,
    exchange: Arc<dyn Exchange>,
    notifier: Arc<dyn Notifier>,
) -> TrendlineBreakoutMonitor {
    TrendlineBreakoutMonitor::new(
        exchange,
        create_store(settings),
        notifier,
        settings.monitor.clone(),
        RetryPolicy::from(&settings.exchange),
    )
}

// ============================================================================
// Long-running loops
// ============================================================================

async fn run_trade(settings: Settings, with_monitor: bool) -> anyhow::Result<()> {
    if settings.instruments.is_empty() {
        bail!("no instruments configured");
    }

    let exchange = create_exchange(&settings, true)?;
    let notifier = notify::from_env(&settings.notifier)?;

    let cycle = ExecutionCycle::new(
        exchange.clone(),
        notifier.clone(),
        &settings.instruments,
        settings.cycle.clone(),
        RetryPolicy::from(&settings.exchange),
    )?;

    tracing::info!("\n📊 Configuration:");
    for inst in cycle.instruments() {
        tracing::info!(
            "  {} x{} {} ({})",
            inst.config.instrument_id,
            inst.config.leverage,
            inst.strategy.name(),
            inst.config.trade_mode.as_str()
        );
    }

    let monitor_task = if with_monitor || settings.cycle.with_monitor {
        let monitor = create_monitor(&settings, exchange.clone(), notifier.clone());
        Some(tokio::spawn(monitor.run()))
    } else {
        None
    };
    let trading_task = tokio::spawn(cycle.run_forever());

    tracing::info!("Press Ctrl+C to stop...");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("⚠️  Received Ctrl+C, shutting down...");
        }
        result = trading_task => {
            tracing::error!("Trading loop exited: {:?}", result);
        }
    }

    if let Some(task) = monitor_task {
        task.abort();
    }
    tracing::info!("👋 swapbot stopped");
    Ok(())
}

async fn run_monitor(settings: Settings) -> anyhow::Result<()> {
    let exchange = create_exchange(&settings, false)?;
    let notifier = notify::from_env(&settings.notifier)?;
    let monitor = create_monitor(&settings, exchange, notifier);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("⚠️  Received Ctrl+C, shutting down...");
        }
        _ = monitor.run() => {}
    }
    Ok(())
}

async fn run_watch(settings: Settings, once: bool) -> anyhow::Result<()> {
    let exchange = create_exchange(&settings, false)?;
    let inner = notify::from_env(&settings.notifier)?;
    let notifier: Arc<dyn Notifier> = Arc::new(ThrottledNotifier::new(
        inner,
        Duration::from_secs(settings.notifier.min_interval_secs),
    ));
    let watcher = StochRsiWatcher::new(
        exchange,
        notifier,
        settings.watcher.clone(),
        RetryPolicy::from(&settings.exchange),
    );

    if once {
        let alerts = watcher.scan_all().await;
        println!("{} divergence alert(s)", alerts.len());
        for alert in alerts {
            println!("  {}", alert.message());
        }
        return Ok(());
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("⚠️  Received Ctrl+C, shutting down...");
        }
        _ = watcher.run() => {}
    }
    Ok(())
}

// ============================================================================
// Trendline management
// ============================================================================

fn parse_anchor(time: &str, price: f64) -> anyhow::Result<AnchorPoint> {
    let time = parse_gmt8(time).ok_or_else(|| anyhow!("bad time {:?}, expected YYYY-MM-DD HH:MM:SS", time))?;
    Ok(AnchorPoint { time, price })
}

fn parse_status(status: &str) -> anyhow::Result<TrendlineStatus> {
    match status {
        "active" => Ok(TrendlineStatus::Active),
        "paused" => Ok(TrendlineStatus::Paused),
        "deleted" => Ok(TrendlineStatus::Deleted),
        other => bail!("unknown status {:?} (active, paused, deleted)", other),
    }
}

fn print_trendline(line: &Trendline) {
    println!(
        "{}  {:<8} {:<16} {:<10} {} @ {} -> {} @ {}  {}",
        line.id,
        line.status.to_string(),
        line.symbol,
        line.direction.to_string(),
        format_gmt8(&line.start_point.time),
        line.start_point.price,
        format_gmt8(&line.end_point.time),
        line.end_point.price,
        line.name
    );
}

async fn set_status(store: &dyn TrendlineStore, id: Uuid, status: TrendlineStatus) -> anyhow::Result<()> {
    match store.update(id, TrendlinePatch::status(status)).await? {
        Some(line) => {
            print_trendline(&line);
            Ok(())
        }
        None => bail!("trendline {} not found", id),
    }
}

async fn run_trendline(settings: Settings, cmd: TrendlineCommand) -> anyhow::Result<()> {
    let store = create_store(&settings);

    match cmd {
        TrendlineCommand::Add {
            name,
            symbol,
            start,
            start_price,
            end,
            end_price,
            direction,
        } => {
            let line = store
                .create(NewTrendline {
                    name,
                    symbol,
                    start_point: parse_anchor(&start, start_price)?,
                    end_point: parse_anchor(&end, end_price)?,
                    direction: Direction::try_from(direction)?,
                })
                .await?;
            print_trendline(&line);
        }
        TrendlineCommand::List { status, symbol } => {
            let filter = TrendlineFilter {
                status: status.as_deref().map(parse_status).transpose()?,
                symbol,
            };
            for line in store.list(&filter).await? {
                print_trendline(&line);
            }
        }
        TrendlineCommand::Show { id } => match store.get(id).await? {
            Some(line) => print_trendline(&line),
            None => bail!("trendline {} not found", id),
        },
        TrendlineCommand::Pause { id } => set_status(store.as_ref(), id, TrendlineStatus::Paused).await?,
        TrendlineCommand::Activate { id } => set_status(store.as_ref(), id, TrendlineStatus::Active).await?,
        TrendlineCommand::Delete { id } => {
            if !store.delete(id).await? {
                bail!("trendline {} not found", id);
            }
            println!("deleted {}", id);
        }
        TrendlineCommand::Check { id } => {
            let exchange = create_exchange(&settings, false)?;
            let mut monitor = create_monitor(&settings, exchange, Arc::new(notify::LogNotifier));
            let check = monitor.check_now(id, Utc::now()).await?;
            let crossing = check
                .crossing
                .map(|b| b.direction.to_string())
                .unwrap_or_else(|| "none".to_string());
            println!(
                "price {:?}, trendline {:?}, crossing {}, qualifies {}",
                check.price, check.trendline_value, crossing, check.qualifies
            );
        }
        TrendlineCommand::Logs { id, limit } => {
            for log in store.breakout_logs(id, limit).await? {
                println!(
                    "{}  {}  {:<10} price {} trendline {}",
                    format_gmt8(&log.detected_at),
                    log.trendline_id,
                    log.direction.to_string(),
                    log.price,
                    log.trendline_value
                );
            }
        }
        TrendlineCommand::Export { path } => {
            let n = export_trendlines(store.as_ref(), &path).await?;
            println!("exported {} trendline(s) to {}", n, path.display());
        }
        TrendlineCommand::Import { path } => {
            let n = import_trendlines(store.as_ref(), &path).await?;
            println!("imported {} trendline(s) from {}", n, path.display());
        }
    }

    Ok(())
}
