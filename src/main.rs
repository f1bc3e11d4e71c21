use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use outbound_guard::{logging, NormalizedDomain, Policy, PolicyConfig, Prober, UrlGuard};

/// Check outbound URLs and domains against an SSRF policy.
#[derive(Debug, Parser)]
#[command(name = "outbound-guard", version, about)]
struct Cli {
    /// Policy file (TOML). Defaults apply when omitted, which deny every URL.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Seconds to wait for DNS before denying.
    #[arg(long, global = true, default_value_t = 5)]
    resolve_timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a URL against the policy.
    CheckUrl { url: String },

    /// Normalize and validate a domain name.
    CheckDomain { domain: String },

    /// Ping a validated domain once.
    Ping {
        domain: String,

        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },

    /// Fetch a URL, validating every redirect hop.
    #[cfg(feature = "fetch")]
    Fetch { url: String },
}

const EXIT_DENIED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = logging::init_logging() {
        eprintln!("outbound-guard: {err:#}");
    }

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("outbound-guard error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::CheckUrl { url } => {
            let guard = load_guard(cli.config.as_ref(), cli.resolve_timeout_secs)?;
            match guard.validate(&url).await {
                Ok(validated) => {
                    let ips: Vec<String> = validated.ips().iter().map(|ip| ip.to_string()).collect();
                    println!("allowed {} ({})", validated.host(), ips.join(", "));
                    Ok(ExitCode::SUCCESS)
                }
                Err(denied) => {
                    println!("denied: {} [{}]", denied, denied.reason());
                    Ok(ExitCode::from(EXIT_DENIED))
                }
            }
        }
        Command::CheckDomain { domain } => match NormalizedDomain::parse(&domain) {
            Ok(normalized) => {
                println!("{normalized}");
                Ok(ExitCode::SUCCESS)
            }
            Err(invalid) => {
                println!("{invalid}");
                Ok(ExitCode::from(EXIT_DENIED))
            }
        },
        Command::Ping {
            domain,
            timeout_secs,
        } => {
            let prober = Prober::default().timeout(Duration::from_secs(timeout_secs));
            match prober.probe(&domain).await {
                Ok(output) => {
                    print!("{output}");
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) if err.is_policy_violation() => {
                    println!("{}", err.public_message());
                    Ok(ExitCode::from(EXIT_DENIED))
                }
                Err(err) => {
                    tracing::warn!(error = %err, "probe failed");
                    println!("{}", err.public_message());
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        #[cfg(feature = "fetch")]
        Command::Fetch { url } => {
            let guard = load_guard(cli.config.as_ref(), cli.resolve_timeout_secs)?;
            match outbound_guard::fetch(&guard, &url).await {
                Ok(result) => {
                    let status = result.response.status();
                    let body = result
                        .response
                        .text()
                        .await
                        .context("failed to read response body")?;
                    eprintln!("status {} after {} hop(s)", status, result.chain.len());
                    print!("{body}");
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    if let Some(reason) = err.deny_reason() {
                        tracing::info!(%reason, "fetch denied");
                        println!("{}", err.public_message());
                        return Ok(ExitCode::from(EXIT_DENIED));
                    }
                    tracing::warn!(error = %err, "fetch failed");
                    println!("{}", err.public_message());
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

fn load_guard(path: Option<&PathBuf>, resolve_timeout_secs: u64) -> Result<UrlGuard> {
    let config = match path {
        Some(path) => PolicyConfig::load(path)?,
        None => PolicyConfig::default(),
    };
    let policy = Policy::from_config(&config).context("invalid outbound policy")?;
    let guard = UrlGuard::new(policy)
        .context("failed to initialize DNS resolver")?
        .resolve_timeout(Duration::from_secs(resolve_timeout_secs));
    Ok(guard)
}
