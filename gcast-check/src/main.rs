//! gcast-check - Verify credentials, account access and publishing quota

use anyhow::{Context, Result};
use clap::Parser;
use libgraphcast::auth::{TokenCheck, TokenValidator};
use libgraphcast::logging;
use libgraphcast::platforms::client::{AccountInfo, PublishClient, PublishingQuota};
use libgraphcast::{Config, GraphcastError, Platform, Publisher};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "gcast-check")]
#[command(version)]
#[command(about = "Check credentials, account access and publishing quota")]
#[command(long_about = "\
Check that a platform is ready for publishing: the token is valid and carries
the publishing permissions, the account answers, and there is quota left for
today. Tokens and account ids are printed masked.

EXIT CODES:
    0   Ready
    1   Configuration, network or platform failure
    2   Token rejected")]
struct Cli {
    /// Platform to check (instagram or threads)
    #[arg(short, long, default_value = "instagram")]
    platform: String,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct Report {
    platform: Platform,
    token: String,
    account: String,
    token_check: Option<TokenCheck>,
    account_info: Option<AccountInfo>,
    quota: Option<PublishingQuota>,
    problems: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::config_from_env(cli.verbose).init();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            e.downcast_ref::<GraphcastError>()
                .map(GraphcastError::exit_code)
                .unwrap_or(1)
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let json = match cli.format.to_lowercase().as_str() {
        "text" => false,
        "json" => true,
        other => {
            return Err(GraphcastError::Validation(format!(
                "Invalid format: '{}'. Valid options: text, json",
                other
            ))
            .into())
        }
    };
    let platform = cli
        .platform
        .parse::<Platform>()
        .map_err(GraphcastError::Validation)?;

    let config = Config::load().context("Failed to load configuration")?;
    let publisher = Publisher::from_config(&config);
    let client = publisher.client(platform).ok_or_else(|| {
        GraphcastError::from(libgraphcast::error::ConfigError::PlatformDisabled(
            platform.to_string(),
        ))
    })?;

    let (report, code) = check(platform, client).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&report);
    }
    Ok(code)
}

async fn check(platform: Platform, client: &PublishClient) -> Result<(Report, i32)> {
    let credentials = client.credentials()?;
    let mut report = Report {
        platform,
        token: credentials.masked_token(),
        account: credentials.masked_account(),
        token_check: None,
        account_info: None,
        quota: None,
        problems: Vec::new(),
    };
    let mut code = 0;

    match TokenValidator::new().validate(client).await {
        Ok(check) => report.token_check = Some(check),
        Err(e) => {
            code = e.exit_code();
            report.problems.push(e.to_string());
        }
    }

    match client.check_connection().await {
        Ok(info) => report.account_info = Some(info),
        Err(e) => {
            code = code.max(1);
            report.problems.push(e.to_string());
        }
    }

    match client.publishing_quota().await {
        Ok(quota) => {
            if quota.remaining() == 0 {
                report
                    .problems
                    .push("Publishing quota exhausted for the current 24h window".to_string());
                code = code.max(1);
            }
            report.quota = Some(quota);
        }
        Err(e) => report.problems.push(format!("Quota unavailable: {}", e)),
    }

    Ok((report, code))
}

fn print_text(report: &Report) {
    println!("Platform: {}", report.platform);
    println!("Token:    {}", report.token);
    println!("Account:  {}", report.account);

    match &report.token_check {
        Some(TokenCheck::Verified { scopes, expires_at }) => {
            println!("Verdict:  valid ({})", scopes.join(", "));
            match expires_at {
                Some(ts) => println!(
                    "Expires:  {}",
                    libgraphcast::scheduling::format_timestamp(*ts)
                ),
                None => println!("Expires:  never"),
            }
        }
        Some(TokenCheck::Unverified { reason }) => println!("Verdict:  unverified ({})", reason),
        None => println!("Verdict:  rejected"),
    }

    if let Some(info) = &report.account_info {
        println!(
            "Username: {}",
            info.username.as_deref().unwrap_or("(not shared)")
        );
    }

    if let Some(quota) = &report.quota {
        println!(
            "Quota:    {}/{} used, {} left",
            quota.usage,
            quota.total,
            quota.remaining()
        );
    }

    for problem in &report.problems {
        eprintln!("Problem: {}", problem);
    }
}
