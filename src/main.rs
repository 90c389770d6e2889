//! sift - query engine for keyboard launchers.
//!
//! Runs queries against the configured providers and prints the ranked
//! results of the newest round.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad config, unknown provider, activation failed, etc.)

use anyhow::{Context, Result};
use futures::future::join_all;
use sift::cli::{Args, OutputFormat};
use sift::config::{Config, CONFIG_FILE_NAME};
use sift::history::{HistoryStore, UsageHistory};
use sift::presentation::{EventReceiver, ExitReason, PresentationEvent, RoundResults, Selection};
use sift::provider::Registry;
use sift::render;
use sift::Session;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("sift v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_session(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Session failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default sift.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE_NAME);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to add providers, prefixes, blacklists and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so they never mix with rendered results.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run one session. Returns the exit code.
async fn run_session(args: Args) -> Result<i32> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let history = open_history(&args, &config)?;
    let registry = Registry::from_config(&config).context("Failed to build providers")?;

    if registry.is_empty() {
        warn!(
            "No providers configured. Run with --init-config to create {}",
            CONFIG_FILE_NAME
        );
    }

    let hide_sub = config.list.hide_sub;
    let (session, events) = Session::new(registry, config, history);

    for name in &args.provider {
        session
            .pin(name)
            .with_context(|| format!("Cannot pin provider '{}'", name))?;
    }

    let mut presenter = tokio::spawn(present(events, args.format, hide_sub));
    let mut exit = None;

    let last = if args.reads_stdin() {
        let (last, reason) = read_queries(&session, &mut presenter).await?;
        exit = reason;
        last
    } else {
        run_queries(&session, &args.query).await?
    };

    let mut exit_code = 0;
    if let (Some(n), None) = (args.activate, exit) {
        exit_code = activate(&session, last.as_ref(), n, args.alt, args.format);
    }

    if exit.is_none() {
        session.end();
        match presenter.await {
            Ok(reason) => debug!(?reason, "Presentation finished"),
            Err(e) => warn!("Presentation task failed: {}", e),
        }
    }

    Ok(exit_code)
}

/// Fire all queries back to back and wait for every round.
async fn run_queries(session: &Session, queries: &[String]) -> Result<Option<RoundResults>> {
    let rounds: Vec<_> = queries.iter().map(|query| session.query(query)).collect();

    let mut last = None;
    for round in join_all(rounds).await {
        if let Some(results) = round.context("Round task failed")? {
            last = Some(results);
        }
    }

    Ok(last)
}

/// Run one round per stdin line until EOF or the session times out.
async fn read_queries(
    session: &Session,
    presenter: &mut JoinHandle<ExitReason>,
) -> Result<(Option<RoundResults>, Option<ExitReason>)> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read query from stdin")? else {
                    break;
                };

                if let Some(results) = session.query(&line).await.context("Round task failed")? {
                    last = Some(results);
                }
            }
            reason = &mut *presenter => {
                let reason = reason.unwrap_or(ExitReason::Closed);
                info!(?reason, "Session ended while reading queries");
                return Ok((last, Some(reason)));
            }
        }
    }

    Ok((last, None))
}

/// Activate the `n`-th entry (1-based) of the last published round.
fn activate(
    session: &Session,
    last: Option<&RoundResults>,
    n: usize,
    alternate: bool,
    format: OutputFormat,
) -> i32 {
    let Some(results) = last else {
        eprintln!("⚠️  No published results to activate.");
        return 1;
    };

    let mut selection = Selection::new(results.entries.len(), session.config().list.cycle);
    let picked = if selection.select(n - 1) {
        selection.index().and_then(|index| results.entries.get(index))
    } else {
        None
    };

    let Some(entry) = picked else {
        eprintln!(
            "⚠️  Cannot activate entry {}: the last round has {} entries.",
            n,
            results.entries.len()
        );
        return 1;
    };

    match session.activate(entry, &results.query, alternate) {
        Ok(invocation) => {
            match format {
                OutputFormat::Plain => println!("{}", invocation.command),
                OutputFormat::Json => match serde_json::to_string(&invocation) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("Failed to render invocation: {}", e);
                        return 1;
                    }
                },
            }
            0
        }
        Err(e) => {
            error!(label = %entry.label, "Activation aborted: {}", e);
            1
        }
    }
}

/// Single consumer of presentation events.
async fn present(mut events: EventReceiver, format: OutputFormat, hide_sub: bool) -> ExitReason {
    while let Some(event) = events.recv().await {
        match event {
            PresentationEvent::RoundBegin { generation, query } => {
                debug!(generation, query = %query, "Round started");
            }
            PresentationEvent::Results(results) => match format {
                OutputFormat::Plain => print!("{}", render::render_plain(&results, hide_sub)),
                OutputFormat::Json => match render::render_json(&results) {
                    Ok(json) => println!("{}", json),
                    Err(e) => warn!("Failed to render round {}: {}", results.generation, e),
                },
            },
            PresentationEvent::Typeahead { suggestion, .. } => {
                if format == OutputFormat::Plain {
                    println!("~ {}", suggestion);
                }
            }
            PresentationEvent::ItemActivated { provider, label } => {
                info!(provider = %provider, label = %label, "Item activated");
            }
            PresentationEvent::SessionExit(reason) => {
                if reason == ExitReason::Timeout {
                    eprintln!("⏱️  Session timed out.");
                }
                return reason;
            }
        }
    }

    ExitReason::Closed
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path)
            .with_context(|| format!("Failed to load config file: {}", config_path.display()));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Open the usage history named by the configuration, or the default one.
fn open_history(args: &Args, config: &Config) -> Result<Arc<dyn HistoryStore>> {
    if args.no_history {
        debug!("Usage history kept in memory");
        return Ok(Arc::new(UsageHistory::in_memory()));
    }

    let path = config
        .session
        .history_file
        .clone()
        .or_else(UsageHistory::default_path);

    match path {
        Some(path) => {
            debug!("Usage history at {}", path.display());
            let history = UsageHistory::open(path.clone())
                .with_context(|| format!("Failed to open history file: {}", path.display()))?;
            Ok(Arc::new(history))
        }
        None => {
            warn!("No cache directory found, usage history is not persisted");
            Ok(Arc::new(UsageHistory::in_memory()))
        }
    }
}
