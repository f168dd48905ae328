//! gcast-post - Publish hosted images to Instagram or Threads

use anyhow::{Context, Result};
use clap::Parser;
use libgraphcast::logging;
use libgraphcast::scheduling::{format_timestamp, parse_schedule};
use libgraphcast::{
    Config, GraphcastError, Platform, PublishOutcome, PublishRequest, PublishResult, Publisher,
};
use tracing::warn;

/// Exit code after SIGINT/SIGTERM
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "gcast-post")]
#[command(version)]
#[command(about = "Publish hosted images to Instagram or Threads")]
#[command(long_about = "\
Publish one or more publicly hosted images as a single post (several images
become a carousel).

The platform fetches the images itself, so every URL must be reachable from
the internet. Publishing waits until the platform has finished processing the
media, which can take a few minutes.

Interrupting a run (Ctrl-C) stops waiting but cannot undo containers already
created on the platform. Re-running the same command creates new containers
and may publish the post twice.

EXIT CODES:
    0   Published or scheduled
    1   Platform, network or configuration failure
    2   Token rejected
    3   Invalid input
    130 Interrupted")]
struct Cli {
    /// Public image URLs, in display order
    images: Vec<String>,

    /// Caption text
    #[arg(short, long, default_value = "")]
    caption: String,

    /// Hashtag appended after the caption (repeatable)
    #[arg(short = 't', long = "hashtag")]
    hashtags: Vec<String>,

    /// Target platform (instagram or threads)
    #[arg(short, long, default_value = "instagram")]
    platform: String,

    /// Schedule instead of publishing now ("2h", "tomorrow 10am", epoch seconds)
    #[arg(short, long)]
    schedule: Option<String>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = GraphcastError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(GraphcastError::Validation(format!(
                "Invalid format: '{}'. Valid options: text, json",
                s
            ))),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::config_from_env(cli.verbose).init();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code(&e)
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let format: OutputFormat = cli.format.parse()?;
    let platform = cli.platform.parse::<Platform>().map_err(GraphcastError::Validation)?;

    let mut request = PublishRequest::new(platform, cli.images, cli.caption)
        .with_hashtags(cli.hashtags);
    if let Some(expr) = &cli.schedule {
        request = request.with_schedule(parse_schedule(expr)?);
    }

    let config = Config::load().context("Failed to load configuration")?;
    let publisher = Publisher::from_config(&config);

    tokio::select! {
        outcome = publisher.publish(&request) => {
            let (result, code) = match outcome {
                Ok(result) => (result, 0),
                Err(e) => {
                    let result = PublishResult::failed(platform, request.image_urls.len(), &e);
                    (result, e.exit_code())
                }
            };
            print_result(&result, format)?;
            Ok(code)
        }
        _ = wait_for_shutdown() => {
            warn!(
                "Interrupted: containers may already exist on {}; running again can post twice",
                platform
            );
            eprintln!(
                "Interrupted. Containers may already exist on {}. Re-running this command can publish the post twice.",
                platform
            );
            Ok(EXIT_INTERRUPTED)
        }
    }
}

fn print_result(result: &PublishResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        OutputFormat::Text => match result.outcome {
            PublishOutcome::Published => {
                println!(
                    "{}:{}",
                    result.platform,
                    result.media_id.as_deref().unwrap_or_default()
                );
            }
            PublishOutcome::Scheduled => {
                println!(
                    "{}:{} scheduled for {}",
                    result.platform,
                    result.container_id.as_deref().unwrap_or_default(),
                    result.scheduled_time.map(format_timestamp).unwrap_or_default()
                );
            }
            PublishOutcome::Failed => {
                if let Some(diagnostic) = &result.error {
                    eprintln!("Error: {}", diagnostic.message);
                    if let Some(detail) = &diagnostic.detail {
                        eprintln!("  {}", detail);
                    }
                }
            }
        },
    }
    Ok(())
}

fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<GraphcastError>()
        .map(GraphcastError::exit_code)
        .unwrap_or(1)
}

/// Resolves on SIGINT/SIGTERM. If handlers cannot be installed the run
/// carries on without them and this never resolves.
#[cfg(unix)]
async fn wait_for_shutdown() {
    use futures::StreamExt;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook_tokio::Signals;

    match Signals::new([SIGINT, SIGTERM]) {
        Ok(mut signals) => {
            signals.next().await;
        }
        Err(e) => {
            warn!("Signal setup failed, Ctrl-C will not be handled: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Signal setup failed, Ctrl-C will not be handled: {}", e);
        std::future::pending::<()>().await;
    }
}
