use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use futurecast::app::AppPaths;
use futurecast::logging::init_logging;
use futurecast::timeline::TimelineStyle;

mod cmd;

#[derive(Parser)]
#[command(name = "futurecast")]
#[command(version, about = "Generate and browse possible futures for a decision")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip confirmation prompts
    #[arg(long, global = true)]
    pub yes: bool,

    /// Data directory holding futurecast.toml, the cache and logs
    #[arg(long, global = true, env = "FUTURECAST_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Also write logs to a daily file under <data-dir>/logs
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a generation session for a decision and cache the timeline
    Generate {
        /// The decision to explore
        #[arg(required = true, num_args = 1..)]
        decision: Vec<String>,

        /// Visual style: realistic, optimistic, cinematic, documentary
        #[arg(short, long, default_value = "realistic")]
        style: TimelineStyle,

        /// Print the timeline as JSON
        #[arg(long)]
        json: bool,

        /// Hide the progress bar
        #[arg(short, long)]
        quiet: bool,
    },
    /// Browse and manage cached timelines
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Pull a user's timelines from the remote store into the cache
    Sync {
        /// Remote user id
        #[arg(short, long)]
        user: String,

        /// Remote base URL (overrides FUTURECAST_REMOTE_URL and futurecast.toml)
        #[arg(long)]
        remote_url: Option<String>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum CacheCommands {
    /// List cached timelines, most recent first
    List {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show one timeline
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Search titles and decision text
    Search { query: String },
    /// List timelines of one style
    Style { style: TimelineStyle },
    /// Remove one timeline
    Remove { id: String },
    /// Show cache statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Drop expired timelines
    Prune,
    /// Remove every cached timeline
    Clear,
    /// Write all timelines to a snapshot file
    Export { path: PathBuf },
    /// Merge timelines from a snapshot file
    Import { path: PathBuf },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default futurecast.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let paths = AppPaths::resolve(cli.data_dir.clone());

    let log_dir = cli.log_file.then_some(paths.log_dir.as_path());
    let _log_guard = init_logging(cli.verbose, cli.log_json, log_dir)?;

    match &cli.command {
        Commands::Generate {
            decision,
            style,
            json,
            quiet,
        } => {
            let decision = decision.join(" ");
            cmd::cmd_generate(&cli, &paths, &decision, *style, *json, *quiet).await?;
        }
        Commands::Cache { command } => cmd::cmd_cache(&cli, &paths, command.clone()).await?,
        Commands::Sync { user, remote_url } => {
            cmd::cmd_sync(&paths, user, remote_url.as_deref()).await?
        }
        Commands::Config { command } => cmd::cmd_config(&paths, command.clone())?,
    }

    Ok(())
}
