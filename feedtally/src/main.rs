//! feedtally - collect posts and engagement counts from a scrolled social feed
//!
//! Subcommands:
//! - `collect`: scroll a captured feed to the end and export a CSV
//! - `parse`: print the posts found in one saved page as JSON lines
//! - `serve`: answer START/STOP/STATUS/CLEAR/EXPORT commands over stdin/stdout
//!
//! File locations follow the XDG Base Directory layout:
//! - Exports: $XDG_DATA_HOME/feedtally/exports/ (~/.local/share/feedtally/exports/)
//! - Logs: $XDG_STATE_HOME/feedtally/feedtally.log (~/.local/state/feedtally/feedtally.log)
//! - Config: $XDG_CONFIG_HOME/feedtally/config.toml (~/.config/feedtally/config.toml)

mod collect;
mod serve;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use feedtally_core::extract::parse_document;
use feedtally_core::{Config, RecordParser};

#[derive(Parser)]
#[command(name = "feedtally")]
#[command(about = "Collect posts and engagement counts from a scrolled social feed")]
#[command(version)]
struct Cli {
    /// Verbose output (-v debug log + run details, -vv trace log)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scroll a captured feed until done and export the posts as CSV
    Collect(CollectArgs),
    /// Print the posts in one saved page as JSON lines
    Parse {
        /// Saved HTML page
        file: PathBuf,

        /// Page address, used to resolve relative permalinks
        #[arg(long)]
        location: Option<String>,
    },
    /// Answer JSON commands read line by line from stdin
    Serve {
        /// Directory of captured frames (*.html, replayed in name order)
        #[arg(long)]
        frames: PathBuf,

        /// Address of the profile page the frames were captured from
        #[arg(long)]
        location: String,

        /// Directory exports are written to
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct CollectArgs {
    /// Directory of captured frames (*.html, replayed in name order)
    #[arg(long)]
    frames: PathBuf,

    /// Address of the profile page the frames were captured from
    #[arg(long)]
    location: String,

    /// Stop after this many posts (1-50000)
    #[arg(long)]
    max: Option<usize>,

    /// Wait after each scroll in milliseconds (250-3000)
    #[arg(long)]
    wait_ms: Option<u64>,

    /// Give up after this many scrolls without a new post
    #[arg(long)]
    max_idle: Option<u32>,

    /// Keep posts by every author, not only the profile owner
    #[arg(long)]
    all_authors: bool,

    /// Directory the CSV is written to
    #[arg(long)]
    out: Option<PathBuf>,

    /// Seed the collection from a previous export
    #[arg(long)]
    resume: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let level = match cli.verbose {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    };
    let _log_guard = feedtally_core::logging::init_with_level(&config.logging, level)
        .context("failed to initialize logging")?;

    tracing::info!("feedtally starting");

    match cli.command {
        Commands::Collect(args) => collect::run(&args, config, cli.verbose),
        Commands::Parse { file, location } => run_parse(&file, location, &config),
        Commands::Serve {
            frames,
            location,
            out,
        } => serve::run(&frames, &location, out, &config),
    }
}

/// Print every post in one saved page as a JSON line
fn run_parse(file: &Path, location: Option<String>, config: &Config) -> Result<()> {
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let parser = RecordParser::new(location.unwrap_or_else(|| config.feed.base_url.clone()));

    let records = parse_document(&html, &parser);
    for record in &records {
        println!(
            "{}",
            serde_json::to_string(record).context("failed to encode record")?
        );
    }

    tracing::info!(file = %file.display(), count = records.len(), "parse complete");
    Ok(())
}
