use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;

pub mod commands;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] telecast_core::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("channel store error: {0}")]
    Channel(#[from] telecast_core::ChannelError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("required resource missing: {0}")]
    MissingResource(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Telecast command-line control interface", long_about = None)]
pub struct Cli {
    /// Path to telecast.toml
    #[arg(long, default_value = "configs/telecast.toml")]
    pub config: PathBuf,
    /// Override path to channels.sqlite
    #[arg(long)]
    pub channels_db: Option<PathBuf>,
    /// Override the snapshot cache directory
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Channel store operations
    #[command(subcommand)]
    Channel(ChannelCommands),
    /// Preview the deterministic schedule of a channel
    #[command(subcommand)]
    Schedule(ScheduleCommands),
    /// Snapshot cache maintenance
    #[command(subcommand)]
    Cache(CacheCommands),
    /// Stream plan inspection
    #[command(subcommand)]
    Plan(PlanCommands),
}

#[derive(Subcommand, Debug)]
pub enum ChannelCommands {
    /// List stored channels
    List,
    /// Print one channel as serialized JSON
    Show(ChannelShowArgs),
    /// Store a channel from its serialized JSON shape
    Create(ChannelCreateArgs),
    /// Delete a channel
    Delete(ChannelShowArgs),
}

#[derive(Args, Debug)]
pub struct ChannelShowArgs {
    /// Channel id
    pub id: String,
}

#[derive(Args, Debug)]
pub struct ChannelCreateArgs {
    /// Path to a serialized channel JSON file
    pub file: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum ScheduleCommands {
    /// What a channel is playing at an instant (defaults to now)
    Now(ScheduleArgs),
    /// The item scheduled after the active one
    Next(ScheduleArgs),
}

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Channel id
    pub id: String,
    /// RFC 3339 instant to evaluate instead of the current time
    #[arg(long)]
    pub at: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Summarize persisted snapshots
    Status,
    /// Remove persisted snapshots
    Purge(CachePurgeArgs),
}

#[derive(Args, Debug)]
pub struct CachePurgeArgs {
    /// Only purge snapshots older than this many hours
    #[arg(long)]
    pub older_than_hours: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum PlanCommands {
    /// Evaluate codec compatibility for a technical-metadata JSON file
    DryRun(PlanDryRunArgs),
}

#[derive(Args, Debug)]
pub struct PlanDryRunArgs {
    /// Path to a JSON file with the item's technical metadata
    pub metadata: PathBuf,
    /// Evaluate as if the caller forced a remux
    #[arg(long, default_value_t = false)]
    pub force_remux: bool,
}

pub fn run(cli: Cli) -> Result<()> {
    init_tracing();
    let config = telecast_core::load_telecast_config(&cli.config)?;
    match &cli.command {
        Commands::Channel(command) => commands::channel::execute(&cli, command),
        Commands::Schedule(command) => commands::schedule::execute(&cli, command),
        Commands::Cache(command) => commands::cache::execute(&cli, &config, command),
        Commands::Plan(command) => commands::plan::execute(&cli, &config, command),
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

impl Cli {
    pub fn channels_db_path(&self) -> PathBuf {
        self.channels_db
            .clone()
            .unwrap_or_else(|| PathBuf::from("data/channels.sqlite"))
    }

    pub fn cache_dir_path(&self, config: &telecast_core::TelecastConfig) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.library.cache_dir))
    }
}
