//! Budget Relay CLI
//!
//! Command-line interface for the budget alert relay.

use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

use budget_relay::alerting::{BudgetAlertRelay, ThrottlePolicy};
use budget_relay::api::HttpServer;
use budget_relay::config::LoggingConfig;
use budget_relay::models::PushEnvelope;
use budget_relay::{db, Config};

/// Budget Relay - forward billing budget alerts to chat
#[derive(Parser)]
#[command(name = "budget-relay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "BUDGET_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Receive push deliveries over HTTP
    Serve {
        /// Host to bind to (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// HTTP port (overrides server.port)
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },

    /// Handle a single envelope and print the result
    Handle {
        /// Envelope JSON file ("-" for stdin)
        #[arg(short, long, default_value = "-")]
        file: String,
    },

    /// Show the throttle record
    Status,

    /// Clear the throttle record so the next alert is sent
    Reset {
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env first so clap's env-backed arguments can see it
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.logging, cli.verbose);

    // Execute command
    let result = match cli.command {
        Commands::Serve { host, port } => run_serve(config, host, port).await,
        Commands::Handle { file } => run_handle(config, &file).await,
        Commands::Status => run_status(config).await,
        Commands::Reset { force } => run_reset(config, force).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let log_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_serve(config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    let relay = BudgetAlertRelay::from_config(&config).await?;
    info!(
        min_interval_hours = config.throttle.min_interval_hours,
        write_mode = ?config.throttle.write_mode,
        "Starting budget relay"
    );

    HttpServer::new(Arc::new(relay))
        .serve(&format!("{host}:{port}"))
        .await?;

    Ok(())
}

async fn run_handle(config: Config, file: &str) -> anyhow::Result<()> {
    let body = if file == "-" {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        buf
    } else {
        std::fs::read(file)?
    };

    let envelope = PushEnvelope::from_slice(&body)?;
    let relay = BudgetAlertRelay::from_config(&config).await?;
    let outcome = relay.handle(&envelope).await?;

    println!("{outcome}");
    Ok(())
}

async fn run_status(config: Config) -> anyhow::Result<()> {
    let store = db::connect(&config.store).await?;
    let policy = ThrottlePolicy::new(config.throttle.min_interval_hours);

    println!("Backend:       {}", store.backend());
    println!("Min interval:  {}h", policy.min_interval_hours());
    match store.get_last_sent().await? {
        Some(last) => {
            println!("Last sent:     {}", last.to_rfc3339());
            match policy.next_eligible_at(last) {
                Some(next) => println!("Next eligible: {}", next.to_rfc3339()),
                None => println!("Next eligible: never"),
            }
            let now = chrono::Utc::now();
            if policy.should_send(now, Some(last)) {
                println!("State:         ready");
            } else if let Some(next) = policy.next_eligible_at(last) {
                let wait = (next - now).to_std().unwrap_or_default();
                println!(
                    "State:         throttled ({} remaining)",
                    humantime::format_duration(std::time::Duration::from_secs(wait.as_secs()))
                );
            } else {
                println!("State:         throttled");
            }
        }
        None => {
            println!("Last sent:     never");
            println!("State:         ready");
        }
    }

    Ok(())
}

async fn run_reset(config: Config, force: bool) -> anyhow::Result<()> {
    if !force {
        println!("This clears the throttle record; the next alert will be sent immediately.");
        println!("Use --force to confirm.");
        return Ok(());
    }

    let store = db::connect(&config.store).await?;
    let current = store.get_last_sent().await?;
    if current.is_none() {
        println!("Throttle record already empty");
        return Ok(());
    }

    if store.compare_and_set(current, None).await? {
        info!(backend = store.backend(), "Throttle record cleared");
        println!("Throttle record cleared");
    } else {
        anyhow::bail!("throttle record changed concurrently, try again");
    }

    Ok(())
}
