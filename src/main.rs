use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, IsTerminal};
use tracing_subscriber::EnvFilter;

use quaint_rss::commands::run_session;
use quaint_rss::config::{self, DEFAULT_LOG_LEVEL};
use quaint_rss::console::Console;
use quaint_rss::fetch::HttpFetcher;
use quaint_rss::store::ProfileStore;

/// Command-line arguments for quaint-rss
#[derive(Parser, Debug)]
#[command(name = "quaint-rss")]
#[command(about = "Read the latest items from the RSS feeds saved in your profile")]
pub struct Cli {
    /// Log straight in as this profile, skipping the entry prompts
    #[arg(short = 'n', long = "profile_name")]
    pub profile_name: Option<String>,
}

/// Logs go to stderr so they never interleave with the prompts on stdout.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config()?;
    init_logging(&cfg.log_level);
    // decided here from config so NO_COLOR/CLICOLOR play no part
    colored::control::set_override(cfg.color && io::stdout().is_terminal());

    let mut store = ProfileStore::open(&cfg.profiles_path).context("Failed to open profile store")?;
    let source = HttpFetcher::new(&cfg).context("Failed to build HTTP client")?;

    let mut console = Console::new(io::stdin().lock(), io::stdout().lock());
    run_session(cli.profile_name, &mut store, &source, &mut console, &cfg).await
}
