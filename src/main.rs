//! CLI entry point for bus_arrivals.
//!
//! Provides subcommands for showing upcoming arrivals at one or more stops,
//! replaying saved feeds, listing the upstream route and stop catalogues,
//! and storing an API key.

mod infra;
mod services;

use crate::infra::keys::{FileKeyStore, KeyConfig, KeyPlacement, KeyStore};
use crate::infra::transit::client::TransitFeedClient;
use crate::services::transit_api::TransitApi;
use anyhow::{Context, Result};
use bus_arrivals::fetch::auth::{ApiKey, UrlParam};
use bus_arrivals::fetch::{BasicClient, HttpClient, RetryPolicy, fetch_text_with_retry};
use bus_arrivals::output::{Theme, render_boards, write_listings};
use bus_arrivals::parser::parse_epoch;
use bus_arrivals::{Direction, StopBoard, StopRequest, process_stop};
use chrono::{Local, Utc};
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;
use tracing::{debug, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Key file written by `set-key` and read when nothing else is configured.
const DEFAULT_KEY_FILE: &str = ".config/bus_arrivals/api_key";

#[derive(Parser)]
#[command(name = "bus_arrivals")]
#[command(about = "Upcoming bus arrivals from schedule and real-time feeds", long_about = None)]
struct Cli {
    /// Base URL of the transit feed service (defaults to $TRANSIT_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// JSON key configuration (defaults to $TRANSIT_KEY_CONFIG)
    #[arg(long, global = true)]
    key_config: Option<String>,

    /// Attempts per upstream request before giving up
    #[arg(long, global = true, default_value_t = 3)]
    retries: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct QueryArgs {
    /// Route to report on; repeat for several
    #[arg(short, long = "route", value_name = "ROUTE", required = true)]
    routes: Vec<String>,

    /// Travel direction
    #[arg(short, long, value_enum)]
    direction: Direction,

    /// Annotate predicted arrivals with lateness against the schedule
    #[arg(long, default_value_t = false)]
    late: bool,

    /// Skip the predictions feed and show scheduled times only
    #[arg(long, default_value_t = false)]
    schedule_only: bool,

    /// Show the schedule as of this time (epoch seconds or local datetime)
    #[arg(long, value_name = "EPOCH|DATETIME", value_parser = parse_fixed_time)]
    at: Option<i64>,

    /// Output theme
    #[arg(long, value_enum, default_value_t = Theme::Text)]
    theme: Theme,
}

impl QueryArgs {
    fn request(&self, stop_id: &str, label: Option<&str>, now_epoch: i64) -> StopRequest {
        let request = StopRequest::new(stop_id, self.direction, self.routes.iter().cloned(), now_epoch)
            .with_lateness(self.late)
            .with_schedule_only(self.schedule_only)
            .with_fixed_time(self.at);
        match label {
            Some(label) => request.with_label(label),
            None => request,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show upcoming arrivals at one or more stops
    Arrivals {
        /// Stop to query; repeat for several, output keeps this order
        #[arg(short, long = "stop", value_name = "STOP", required = true)]
        stops: Vec<String>,

        /// Display label for the stop at the same position
        #[arg(long = "label", value_name = "LABEL")]
        labels: Vec<String>,

        #[command(flatten)]
        query: QueryArgs,

        /// Maximum number of stops fetched concurrently
        #[arg(short, long, default_value_t = 5)]
        concurrency: usize,
    },
    /// Run saved schedule/predictions feeds through the arrivals engine
    Replay {
        /// Schedule feed file or URL
        #[arg(long, value_name = "FILE_OR_URL")]
        schedule: String,

        /// Predictions feed file or URL
        #[arg(long, value_name = "FILE_OR_URL")]
        predictions: Option<String>,

        /// Display label for the replayed stop
        #[arg(long, default_value = "Replay")]
        stop_label: String,

        #[command(flatten)]
        query: QueryArgs,
    },
    /// List the routes served by the upstream service as CSV
    ListRoutes,
    /// List the stops of a route in one direction as CSV
    ListStops {
        #[arg(short, long)]
        route: String,

        #[arg(short, long, value_enum)]
        direction: Direction,
    },
    /// Store an API key in a key file
    SetKey {
        key: String,

        /// Key file to write (defaults to ~/.config/bus_arrivals/api_key)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

fn parse_fixed_time(s: &str) -> std::result::Result<i64, String> {
    parse_epoch(s).ok_or_else(|| format!("unrecognised time '{s}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bus_arrivals.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bus_arrivals.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Arrivals {
            stops,
            labels,
            query,
            concurrency,
        } => {
            let api: Arc<dyn TransitApi> = Arc::new(transit_client(&cli).await?);

            let now = Utc::now().timestamp();
            let requests: Vec<StopRequest> = stops
                .iter()
                .enumerate()
                .map(|(i, stop)| query.request(stop, labels.get(i).map(String::as_str), now))
                .collect();

            let boards = arrivals(api, requests, *concurrency).await?;
            print!("{}", render_boards(query.theme, "Arrivals", &boards)?);
        }
        Commands::Replay {
            schedule,
            predictions,
            stop_label,
            query,
        } => {
            let http = build_http_client(cli.key_config.as_deref()).await?;
            let request = query.request("replay", Some(stop_label.as_str()), Utc::now().timestamp());
            let policy = retry_policy(cli.retries);

            let schedule = fetcher(http.as_ref(), schedule, policy).await?;
            let predictions = match predictions.as_deref().filter(|_| request.wants_predictions()) {
                Some(source) => match fetcher(http.as_ref(), source, policy).await {
                    Ok(text) => Some(text),
                    Err(e) => {
                        warn!(error = %e, "Predictions unavailable, using schedule only");
                        None
                    }
                },
                None => None,
            };

            let board = process_stop(&request, &schedule, predictions.as_deref(), &Local);
            print!("{}", render_boards(query.theme, "Replay", &[board])?);
        }
        Commands::ListRoutes => {
            let client = transit_client(&cli).await?;
            let routes = client.list_routes().await?;
            write_listings(std::io::stdout().lock(), &routes)?;
        }
        Commands::ListStops { route, direction } => {
            let client = transit_client(&cli).await?;
            let stops = client.list_stops(route, *direction).await?;
            write_listings(std::io::stdout().lock(), &stops)?;
        }
        Commands::SetKey { key, path } => {
            let path = match path {
                Some(path) => path.clone(),
                None => default_key_file()?,
            };
            FileKeyStore::store(&path, key)?;
        }
    }

    Ok(())
}

fn resolve_base_url(flag: Option<&str>) -> Result<String> {
    flag.map(str::to_string)
        .or_else(|| std::env::var("TRANSIT_BASE_URL").ok())
        .filter(|url| !url.is_empty())
        .context("no upstream configured; pass --base-url or set TRANSIT_BASE_URL")
}

fn retry_policy(attempts: u32) -> RetryPolicy {
    RetryPolicy {
        attempts: attempts.max(1),
        ..RetryPolicy::default()
    }
}

async fn transit_client(cli: &Cli) -> Result<TransitFeedClient> {
    let http = build_http_client(cli.key_config.as_deref()).await?;
    let client = TransitFeedClient::new(&resolve_base_url(cli.base_url.as_deref())?, http)?;
    Ok(client.with_retry(retry_policy(cli.retries)))
}

fn default_key_file() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set; pass --path")?;
    Ok(Path::new(&home).join(DEFAULT_KEY_FILE))
}

/// Builds the HTTP client, wrapped with whichever credentials are configured.
///
/// Precedence: key config file, `TRANSIT_API_KEY`, the default key file.
/// Without any of them requests go out unauthenticated.
async fn build_http_client(key_config: Option<&str>) -> Result<Arc<dyn HttpClient>> {
    let basic = BasicClient::new()?;
    let key_config = key_config
        .map(str::to_string)
        .or_else(|| std::env::var("TRANSIT_KEY_CONFIG").ok());

    let (key, placement) = match key_config {
        Some(path) => {
            let config = KeyConfig::load(&path)?;
            (Some(config.resolve().await?), config.auth)
        }
        None => match std::env::var("TRANSIT_API_KEY") {
            Ok(key) if !key.trim().is_empty() => (Some(key.trim().to_string()), KeyPlacement::default()),
            _ => {
                let key = match default_key_file() {
                    Ok(path) if path.exists() => {
                        Some(FileKeyStore.get(&path.to_string_lossy()).await?)
                    }
                    _ => None,
                };
                (key, KeyPlacement::default())
            }
        },
    };

    let client: Arc<dyn HttpClient> = match (key, placement) {
        (Some(key), KeyPlacement::UrlParam(param)) => {
            debug!(param = %param, "Sending API key as query parameter");
            Arc::new(UrlParam::new(basic, param, key))
        }
        (Some(key), KeyPlacement::Header(header)) => {
            debug!(header = %header, "Sending API key as header");
            Arc::new(ApiKey::new(basic, &header, &key)?)
        }
        (Some(_), KeyPlacement::None) | (None, _) => {
            info!("No API key configured, requests are unauthenticated");
            Arc::new(basic)
        }
    };
    Ok(client)
}

/// Loads feed data from a local file path or fetches it over HTTP.
#[tracing::instrument(skip(client, policy), fields(source = %source))]
async fn fetcher(client: &dyn HttpClient, source: &str, policy: RetryPolicy) -> Result<String> {
    let text = if source.starts_with("http") {
        fetch_text_with_retry(client, source, policy).await?
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("reading feed file '{source}'"))?
    };
    Ok(text)
}

/// Fetches and processes every stop concurrently, returning the boards in
/// request order.
#[tracing::instrument(skip(api, requests), fields(stops = requests.len()))]
async fn arrivals(
    api: Arc<dyn TransitApi>,
    requests: Vec<StopRequest>,
    concurrency: usize,
) -> Result<Vec<StopBoard>> {
    let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));
    let mut tasks = Vec::with_capacity(requests.len());

    for request in requests {
        let sem = semaphore.clone();
        let api = api.clone();
        let stop_span = tracing::info_span!("process_stop", stop_id = %request.stop_id);

        let task = tokio::spawn(
            async move {
                let _permit = sem.acquire_owned().await?;
                let board = stop_board(api.as_ref(), &request).await?;
                anyhow::Ok(board)
            }
            .instrument(stop_span),
        );
        tasks.push(task);
    }

    // Awaiting in spawn order keeps the caller's stop order.
    let mut boards = Vec::with_capacity(tasks.len());
    for task in tasks {
        boards.push(task.await??);
    }
    Ok(boards)
}

/// Runs both passes for one stop. A failed schedule fetch is fatal; a failed
/// predictions fetch falls back to schedule-only output.
async fn stop_board(api: &dyn TransitApi, request: &StopRequest) -> Result<StopBoard> {
    let schedule = api
        .schedule(&request.stop_id)
        .await
        .with_context(|| format!("schedule for stop {}", request.stop_id))?;

    let predictions = if request.wants_predictions() {
        match api.predictions(&request.stop_id).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "Predictions unavailable, using schedule only");
                None
            }
        }
    } else {
        None
    };

    let board = process_stop(request, &schedule, predictions.as_deref(), &Local);
    info!(
        lines = board.lines.len(),
        skipped = board.skipped,
        predicted = predictions.is_some(),
        "Stop processed"
    );
    Ok(board)
}
