use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use procwarden::config::WardenConfig;
use procwarden::policy::GroupPolicy;
use procwarden::process::build_invocation;
use procwarden::{ChannelListener, LoggingListener, Supervisor};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "procwarden")]
#[command(about = "Supervise local processes through file signal channels", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start every configured process and supervise it until interrupted
    Run {
        /// Path to the TOML configuration
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Validate a configuration and print the planned invocations
    Check {
        /// Path to the TOML configuration
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match cli.command {
        Commands::Run { config } => run(&config),
        Commands::Check { config } => check(&config),
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_filter(filter))
        .init();
}

fn check(path: &Path) -> Result<()> {
    let config = WardenConfig::load(path)?;
    println!("{} {}", "✓".green().bold(), path.display());

    let shared_dir = config
        .supervisor
        .shared_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("<temporary>"));
    println!("  shared dir: {}", shared_dir.display());
    match config.own_slot() {
        Some(slot) => println!("  own slot:   {slot}"),
        None => println!("  own slot:   {}", "none".dimmed()),
    }

    for (position, command) in config.commands().iter().enumerate() {
        let properties = shared_dir.join(format!("{}.properties", command.identity.key()));
        let invocation = build_invocation(command, &properties, &shared_dir)?;
        let resolved = if which::which(&command.program).is_ok() {
            "found".green()
        } else {
            "not found".red()
        };
        println!(
            "{}. {} [{}]",
            position + 1,
            command.identity.to_string().bold(),
            resolved
        );
        println!("   {}", invocation.command_line().dimmed());
    }
    Ok(())
}

fn run(path: &Path) -> Result<()> {
    let config = WardenConfig::load(path)?;
    let context = config.context()?;
    let supervisor = Supervisor::new(context).context("Failed to create supervisor")?;
    info!(
        shared_dir = %supervisor.context().shared_dir().display(),
        "supervisor ready"
    );

    supervisor.register(Arc::new(LoggingListener));
    let (listener, events) = ChannelListener::new();
    supervisor.register(Arc::new(listener));

    let running = Arc::new(AtomicBool::new(true));
    let running_for_signal = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_for_signal.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let mut policy = GroupPolicy::new(&supervisor, config.commands());
    policy.start_all();
    policy.run(&events, &running);

    info!("stopping all processes");
    supervisor
        .stop_all()
        .context("Not every process could be stopped")?;
    Ok(())
}
