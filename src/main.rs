use anyhow::{bail, Context, Result};
use clap::Parser;
use cpi_compass::compare::{ComparisonOutcome, ComparisonRequest};
use cpi_compass::{server, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// CPI Compass — cost-of-living comparison between two U.S. cities
///
/// Compares the latest BLS consumer price index of two locations over the
/// last three years. Cities without their own index use their census division.
///
/// Examples:
///   compass "Pittsburgh, PA" "Seattle, WA"
///   compass "Boise, ID" "Denver, CO" --json
///   compass "St. Louis, MO" "Chicago, IL" --offline
///   compass --serve --port 8080
#[derive(Parser)]
#[command(name = "compass", version, about, long_about = None)]
struct Cli {
    /// Location to convert from, as "City, ST".
    #[arg(index = 1)]
    from: Option<String>,

    /// Location to convert to, as "City, ST".
    #[arg(index = 2)]
    to: Option<String>,

    /// TOML settings file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Area table (TSV). Defaults to the bundled copy.
    #[arg(long)]
    areas: Option<PathBuf>,

    /// State → census division table (CSV). Defaults to the bundled copy.
    #[arg(long)]
    census: Option<PathBuf>,

    /// BLS registration key (switches to the v2 API).
    #[arg(long)]
    api_key: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Fail on ambiguous (city, state) entries instead of taking the last one.
    #[arg(long)]
    strict: bool,

    /// Offline mode: only use cached series.
    #[arg(long)]
    offline: bool,

    /// Print the outcome as JSON.
    #[arg(long)]
    json: bool,

    /// Run the HTTP API instead of a single comparison.
    #[arg(long)]
    serve: bool,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Debug logging on stderr.
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

fn init_tracing(cli: &Cli) {
    let default = if cli.verbose {
        "debug"
    } else if cli.serve {
        "info"
    } else {
        "error"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn settings_from(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from_file(path)?,
        None => Settings::default(),
    };
    settings.apply_env();

    if cli.areas.is_some() {
        settings.areas_path = cli.areas.clone();
    }
    if cli.census.is_some() {
        settings.census_path = cli.census.clone();
    }
    if cli.api_key.is_some() {
        settings.api_key = cli.api_key.clone();
    }
    if let Some(t) = cli.timeout {
        settings.timeout_secs = t;
    }
    if let Some(host) = &cli.host {
        settings.host = host.clone();
    }
    if let Some(port) = cli.port {
        settings.port = port;
    }
    settings.strict |= cli.strict;
    settings.offline |= cli.offline;
    Ok(settings)
}

fn run(cli: Cli) -> Result<i32> {
    let settings = settings_from(&cli)?;
    let coordinator = settings.build_coordinator()?;

    if cli.serve {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;
        runtime.block_on(server::start(Arc::new(coordinator), &settings.host, settings.port))?;
        return Ok(0);
    }

    let (Some(from), Some(to)) = (cli.from.as_deref(), cli.to.as_deref()) else {
        bail!("Two locations are required, e.g. compass \"Pittsburgh, PA\" \"Seattle, WA\"");
    };
    let (city_from, state_from) = parse_place(from)?;
    let (city_to, state_to) = parse_place(to)?;

    let req = match ComparisonRequest::new(city_from, state_from, city_to, state_to) {
        Ok(req) => req,
        Err(failure) => {
            eprintln!("Error: {}", failure);
            return Ok(2);
        }
    };

    let outcome = coordinator.compare(&req);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if let ComparisonOutcome::Failure(failure) = &outcome {
        eprintln!("Error: {}", failure);
    } else {
        for note in outcome.notes(&req) {
            println!("{}", note);
        }
        println!("{}", outcome.sentence(&req));
    }

    Ok(if outcome.is_failure() { 2 } else { 0 })
}

/// "Pittsburgh, PA" → ("Pittsburgh", "PA")
fn parse_place(place: &str) -> Result<(&str, &str)> {
    match place.split_once(',') {
        Some((city, state)) => Ok((city.trim(), state.trim())),
        None => bail!("'{}' should look like \"City, ST\"", place),
    }
}
