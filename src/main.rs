//! mediasift CLI - search, list episodes and resolve videos from configured sites.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mediasift::client::MediaClient;
use mediasift::config::Config;
use mediasift::console::Console;
use mediasift::source::{MediaSource, SourceList};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Declarative site adapters for anime streaming sites.
#[derive(Parser, Debug)]
#[command(name = "mediasift")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Media source JSON document (overrides paths.sources_file).
    #[arg(long, global = true)]
    sources: Option<PathBuf>,

    /// Configuration file (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON on stdout.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List configured media sources.
    Sources,

    /// Search every source, or only one.
    Search {
        keyword: String,

        /// Only search the source with this name.
        #[arg(long)]
        source: Option<String>,
    },

    /// List the episodes on a detail page.
    Episodes {
        /// Source name.
        source: String,
        detail_url: String,
    },

    /// Resolve the video URL behind an episode page.
    Extract {
        /// Source name.
        source: String,
        episode_url: String,

        /// Rendering endpoint: a bare token or a full URL.
        #[arg(long)]
        endpoint: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let console = Console::new();

    if let Err(e) = run(&args, &console).await {
        console.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(args: &Args, console: &Console) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let sources_path = config
        .sources_file(args.sources.as_deref())
        .context("No media source file configured")?;
    let sources = SourceList::load(&sources_path)
        .with_context(|| format!("Failed to load media sources from {}", sources_path.display()))?;
    let client = MediaClient::from_config(&config).context("Failed to create HTTP client")?;

    match &args.command {
        Command::Sources => {
            if args.json {
                return print_json(sources.all());
            }
            console.section(&format!("{} media sources", console.count(sources.len())));
            for source in sources.all() {
                println!("{}", console.source_line(source));
            }
        }

        Command::Search { keyword, source } => {
            let selected: Vec<MediaSource> = match source {
                Some(name) => vec![find_source(&sources, name)?.clone()],
                None => sources.all().to_vec(),
            };

            let mut results = Vec::new();
            for outcome in client.search_all(&selected, keyword).await {
                match outcome.results {
                    Ok(found) => results.extend(found),
                    Err(e) => {
                        console.warning(&format!("{}: {}", outcome.source_name, e));
                    }
                }
            }

            if args.json {
                return print_json(&results);
            }
            console.section(&format!(
                "{} results for \"{}\"",
                console.count(results.len()),
                keyword
            ));
            for (index, result) in results.iter().enumerate() {
                println!("{}", console.search_result(index, result));
            }
        }

        Command::Episodes { source, detail_url } => {
            let source = find_source(&sources, source)?;
            let episodes = client
                .episodes(source, detail_url)
                .await
                .with_context(|| format!("Failed to list episodes on {}", detail_url))?;

            if args.json {
                return print_json(&episodes);
            }
            console.section(&format!("{} episodes", console.count(episodes.len())));
            for episode in &episodes {
                println!("{}", console.episode_line(episode));
            }
        }

        Command::Extract {
            source,
            episode_url,
            endpoint,
        } => {
            let source = find_source(&sources, source)?;
            if endpoint.is_none() && config.rendering.endpoints.is_empty() {
                console.info("No rendering endpoint configured; falling back to BROWSERLESS_URL");
            }
            let outcome = client
                .extract_video(source, episode_url, endpoint.as_deref())
                .await;

            if args.json {
                return print_json(&outcome);
            }
            console.video_outcome(&outcome);
        }
    }

    Ok(())
}

fn find_source<'a>(sources: &'a SourceList, name: &str) -> Result<&'a MediaSource> {
    sources
        .find(name)
        .ok_or_else(|| anyhow::anyhow!("Unknown media source: {}", name))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to encode JSON")?;
    println!("{}", text);
    Ok(())
}
