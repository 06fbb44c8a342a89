//! CLI binary for sidequest.

use anyhow::Context;
use clap::{Parser, Subcommand};
use sidequest::config::OverlayConfig;
use sidequest::inference::{GeminiClient, GeminiConfig, InferenceClient};
use sidequest::{JobRunner, Notifier, Scheduler, SchedulerHandle, StatusServer, StatusStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Sidequest: live narration, quests and villager lines for whatever is on screen.
#[derive(Parser)]
#[command(name = "sidequest", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, env = "SIDEQUEST_CONFIG")]
    config: Option<PathBuf>,

    /// Override the status server port.
    #[arg(long)]
    port: Option<u16>,

    /// Disable text-to-speech.
    #[arg(long)]
    no_speech: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Start the orchestrator and status server.
    Run,

    /// Write the default configuration to the config path.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Validate the configuration and report detected tools.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdin/stdout stay free for the console trigger.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sidequest=info,tower_http=warn")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(OverlayConfig::default_config_path);

    match cli.command {
        Some(Command::InitConfig { force }) => init_config(&config_path, force),
        Some(Command::Check) => {
            let config = load_config(&cli, &config_path)?;
            check(&config)
        }
        Some(Command::Run) | None => {
            let config = load_config(&cli, &config_path)?;
            run(config).await
        }
    }
}

fn load_config(cli: &Cli, path: &std::path::Path) -> anyhow::Result<OverlayConfig> {
    let mut config = if path.exists() {
        info!("loading config from {}", path.display());
        OverlayConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?
    } else {
        if cli.config.is_some() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        OverlayConfig::default()
    };

    if let Some(port) = cli.port {
        config.status.port = port;
    }
    if cli.no_speech {
        config.speech.enabled = false;
    }
    config.validate()?;
    Ok(config)
}

fn init_config(path: &std::path::Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    OverlayConfig::default().save_to_file(path)?;
    println!("wrote default config to {}", path.display());
    Ok(())
}

fn check(config: &OverlayConfig) -> anyhow::Result<()> {
    println!("config: ok");
    match sidequest::capture::from_config(&config.capture) {
        Ok(_) => println!("capture: ok ({:?} backend)", config.capture.backend),
        Err(e) => println!("capture: {e}"),
    }
    match GeminiConfig::from_inference_config(&config.inference) {
        Ok(_) => println!("inference: ok ({})", config.inference.model),
        Err(e) => println!("inference: {e}"),
    }
    let _ = sidequest::speech::from_config(&config.speech);
    println!(
        "status: http://{}:{}/state",
        config.status.host, config.status.port
    );
    Ok(())
}

async fn run(config: OverlayConfig) -> anyhow::Result<()> {
    let frames = sidequest::capture::from_config(&config.capture)?;
    let gemini = GeminiConfig::from_inference_config(&config.inference)?;
    let model = Arc::new(GeminiClient::new(gemini));
    info!(
        provider = model.name(),
        model = model.model(),
        "inference client ready"
    );

    let store = StatusStore::new();
    let notifier = Notifier::new(sidequest::speech::from_config(&config.speech));
    let runner = JobRunner::new(
        frames,
        model,
        config.prompts.clone(),
        config.inference.timeout(),
    )
    .with_capture_timeout(config.capture.timeout());

    let server = StatusServer::start(store.clone(), &config.status).await?;
    let scheduler = Scheduler::new(config.schedule.clone(), runner, store, notifier)
        .with_narration_speech(config.speech.narrate);
    let handle = scheduler.handle();
    let task = scheduler.run();

    println!("sidequest running; status on http://{}/state", server.addr());
    println!("type 'v' for a villager line, 'q' to quit");

    tokio::spawn(console(handle.clone()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
        () = handle.stopped() => {}
    }

    handle.shutdown();
    if let Err(e) = task.await {
        warn!("scheduler task failed: {e}");
    }
    server.shutdown();
    info!("bye");
    Ok(())
}

/// Line-based trigger console on stdin.
async fn console(handle: SchedulerHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                warn!("stdin closed: {e}");
                return;
            }
        };
        match line.trim().to_ascii_lowercase().as_str() {
            "" => {}
            "v" | "villager" => {
                if !handle.trigger_villager() {
                    return;
                }
            }
            "q" | "quit" | "exit" => {
                handle.shutdown();
                return;
            }
            other => println!("unknown command {other:?}; 'v' = villager, 'q' = quit"),
        }
    }
}
