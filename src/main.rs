use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use clap::Parser;
use echovet::config::{default_timeout_ms, load_config, resolve_relative};
use echovet::report::{print_scenario_names, print_suite_report};
use echovet::suite::{builtin_scenarios, load_scenarios, run_suite};
use echovet::verifier::EchoVerifier;
use reqwest::Client;
use url::Url;

#[derive(Parser, Debug)]
#[command(
    name = "echovet",
    version,
    about = "Conformance checks for HTTP echo services",
    disable_help_subcommand = true
)]
struct Cli {
    /// Scenario table to run (JSON array; defaults to the builtin table)
    #[arg(value_name = "SCENARIOS")]
    scenarios: Option<PathBuf>,

    /// Echo service base URL
    #[arg(short, long)]
    base_url: Option<String>,

    /// Directory or file containing echovet.json
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Select a profile from echovet.json
    #[arg(short = 'P', long)]
    profile: Option<String>,

    /// Request timeout in milliseconds
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    /// Print scenario names without sending anything
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;

    let config_target = cli
        .config
        .as_ref()
        .map(|p| resolve_relative(&cwd, &p.to_string_lossy()))
        .unwrap_or_else(|| cwd.clone());
    let cfg = load_config(&config_target).context("loading configuration")?;

    let settings = cfg
        .as_ref()
        .map(|loaded| loaded.resolve(cli.profile.as_deref()))
        .transpose()?;

    let scenario_file = cli
        .scenarios
        .as_ref()
        .map(|p| resolve_relative(&cwd, &p.to_string_lossy()))
        .or_else(|| settings.as_ref().and_then(|s| s.scenarios.clone()));

    let scenarios = match &scenario_file {
        Some(path) => load_scenarios(path)?,
        None => builtin_scenarios(),
    };

    if cli.list {
        let names: Vec<String> = scenarios.iter().map(|s| s.name.clone()).collect();
        print_scenario_names(&names);
        return Ok(());
    }

    let base_url = cli
        .base_url
        .clone()
        .or_else(|| settings.as_ref().and_then(|s| s.base_url.clone()));
    let Some(base_url) = base_url else {
        bail!("no target base URL; pass --base-url or set baseUrl in echovet.json");
    };
    let base_url =
        Url::parse(&base_url).with_context(|| format!("invalid base URL {base_url}"))?;

    let timeout_ms = cli
        .timeout_ms
        .or(settings.as_ref().map(|s| s.timeout_ms))
        .unwrap_or_else(default_timeout_ms);

    let client = Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .context("building HTTP client")?;

    let verifier = EchoVerifier::new(client, base_url);
    let report = run_suite(&verifier, &scenarios).await;
    print_suite_report(&report, verifier.base_url().as_str());

    if !report.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}
