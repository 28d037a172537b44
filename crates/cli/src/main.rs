use anyhow::Context;
use clap::{Parser, Subcommand};
use simdrive_core::{AppConfig, ConfigLoader, RunRequest};
use simdrive_driver::FileSessionStore;
use simdrive_orchestrator::{EventSink, RunCoordinator, StreamEvent};
use simdrive_web_api::ApiServer;
use simdrive_webdriver::WebDriverFactory;
use std::io::Write;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "simdrive")]
#[command(about = "Drives a web options-trading simulator over a range of dates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server that streams simulation runs
    Serve {
        /// Server address (defaults to server.host:server.port from config)
        #[arg(short, long)]
        addr: Option<String>,
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
    /// Run one simulation locally and print its event stream
    Run {
        /// Login phone number
        #[arg(long, env = "SIMDRIVE_PHONE")]
        phone: String,
        /// Login password
        #[arg(long, env = "SIMDRIVE_PASSWORD", hide_env_values = true)]
        password: String,
        /// First date, YYYY-MM-DD
        #[arg(long)]
        start: String,
        /// Last date, YYYY-MM-DD
        #[arg(long)]
        end: String,
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
    /// Print the dates a range expands to
    Dates {
        /// First date, YYYY-MM-DD
        #[arg(long)]
        start: String,
        /// Last date, YYYY-MM-DD
        #[arg(long)]
        end: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the event stream of `run`
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve { addr, config } => {
            run_server(addr, &config).await?;
        }
        Commands::Run {
            phone,
            password,
            start,
            end,
            config,
        } => {
            let request = RunRequest {
                phone_number: Some(phone),
                password: Some(password),
                start_date: Some(start),
                end_date: Some(end),
            };
            run_once(request, &config).await?;
        }
        Commands::Dates { start, end } => {
            let dates = simdrive_core::expand_range(&start, &end);
            if dates.is_empty() {
                anyhow::bail!("no valid dates between {start} and {end}");
            }
            for date in dates {
                println!("{date}");
            }
        }
    }

    Ok(())
}

fn coordinator(config: AppConfig) -> Arc<RunCoordinator> {
    let factory = Arc::new(WebDriverFactory::new(config.webdriver.clone()));
    let store = Arc::new(FileSessionStore::new(config.session.cookie_file.clone()));
    Arc::new(RunCoordinator::new(Arc::new(config), factory, store))
}

async fn run_server(addr: Option<String>, config_path: &str) -> anyhow::Result<()> {
    let config = ConfigLoader::load_from(config_path)?;
    let addr = addr.unwrap_or_else(|| config.server.addr());
    tracing::info!(
        config = config_path,
        webdriver = %config.webdriver.url,
        "starting simulation server"
    );

    let static_dir = config.server.static_dir.clone();
    ApiServer::new(coordinator(config), static_dir)
        .serve(&addr)
        .await
}

async fn run_once(request: RunRequest, config_path: &str) -> anyhow::Result<()> {
    let config = ConfigLoader::load_from(config_path)?;
    let coordinator = coordinator(config);
    let (sink, mut rx) = EventSink::channel(32);

    let task = tokio::spawn(async move { coordinator.run(request, &sink).await });

    let mut stdout = std::io::stdout();
    let mut failed = false;
    while let Some(event) = rx.recv().await {
        failed |= matches!(event, StreamEvent::Error { .. });
        stdout.write_all(event.to_frame()?.as_bytes())?;
        stdout.flush()?;
    }

    let summary = task.await.context("simulation task panicked")?;
    tracing::info!(
        completed = summary.completed,
        skipped = summary.skipped,
        failed = summary.failed,
        "run finished"
    );
    if failed {
        anyhow::bail!("simulation run ended with an error");
    }
    Ok(())
}
