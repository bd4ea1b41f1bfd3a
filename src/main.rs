//! threadwatch - live-updating threaded comment feed viewer
//!
//! Watches a comment thread document (local JSON file or URL), polls it on a
//! timer, and merges newly arrived comments into the rendered tree in place,
//! highlighting them instead of rebuilding the whole view.

mod config;
mod format;
mod model;
mod reconcile;
mod session;
mod source;
mod tui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, Theme};
use crate::reconcile::flatten;
use crate::source::{SnapshotSource, FETCH_TIMEOUT};

#[derive(Parser)]
#[command(name = "threadwatch")]
#[command(about = "Live-updating threaded comment feed viewer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a comment thread live in the TUI
    Watch {
        /// Snapshot source: path to a JSON document, or an http(s) URL
        source: String,

        /// Refresh interval in seconds (overrides config)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Color theme: light or dark (overrides config)
        #[arg(short, long)]
        theme: Option<String>,
    },

    /// Print the flattened comment tree once and exit
    Dump {
        /// Snapshot source: path to a JSON document, or an http(s) URL
        source: String,
    },
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch {
            source,
            interval,
            theme,
        } => {
            let theme = theme
                .map(|raw| Theme::from_str(&raw).context("Invalid theme. Use: light or dark"))
                .transpose()?;
            let config = Config::load()?.with_overrides(interval, theme);
            let source = SnapshotSource::parse(&source);
            tui::run(config, source)
        }
        Commands::Dump { source } => cmd_dump(&source),
    }
}

fn cmd_dump(raw: &str) -> Result<()> {
    let source = SnapshotSource::parse(raw);
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let doc = source.fetch(&client)?;

    if let Some(title) = doc.display_title() {
        println!("{}", title);
        if let Some(link) = doc.thread_link() {
            println!("{}", link);
        }
        println!();
    }

    let flat = flatten(&doc.comments, 0);
    if flat.is_empty() {
        println!("No comments found");
        return Ok(());
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0);

    for item in &flat {
        let indent = "  ".repeat(item.depth);
        let author = item.comment.author.as_deref().unwrap_or("Unknown");
        let when = item
            .comment
            .created
            .map(|created| format::format_time_ago(created, now))
            .unwrap_or_else(|| "Unknown time".to_string());
        let body = item.comment.body.as_deref().unwrap_or("[No content]");

        println!("{}{} ({}):", indent, author, when);
        for line in body.lines() {
            println!("{}  {}", indent, line);
        }
    }

    Ok(())
}

/// Log to the file named by THREADWATCH_LOG, or swallow events so nothing
/// bleeds into the alternate screen.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Ok(path) = std::env::var("THREADWATCH_LOG") {
        if !path.trim().is_empty() {
            if let Ok(file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path.trim())
            {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::sync::Arc::new(file))
                    .with_ansi(false)
                    .try_init();
                return;
            }
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::sink)
        .try_init();
}
