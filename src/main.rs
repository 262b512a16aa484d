//! PredictHub — cross-platform prediction market aggregator.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores the paper-trading ledger from disk (or creates fresh),
//! spawns the API server, and runs the market refresh loop with
//! graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use predicthub::config;
use predicthub::feed::catalog::CatalogFeed;
use predicthub::feed::gamma::GammaClient;
use predicthub::feed::sim::DriftTicks;
use predicthub::feed::QuoteSource;
use predicthub::ledger::Ledger;
use predicthub::narrative::gemini::GeminiClient;
use predicthub::narrative::NarrativeGenerator;
use predicthub::server::routes::{ApiState, AppState};
use predicthub::server::spawn_server;
use predicthub::storage;

const BANNER: &str = r#"
  ____               _ _      _   _   _       _
 |  _ \ _ __ ___  __| (_) ___| |_| | | |_   _| |__
 | |_) | '__/ _ \/ _` | |/ __| __| |_| | | | | '_ \
 |  __/| | |  __/ (_| | | (__| |_|  _  | |_| | |_) |
 |_|   |_|  \___|\__,_|_|\___|\__|_| |_|\__,_|_.__/

  Cross-Platform Prediction Market Dashboard
  v0.1.0 — Paper Trading Simulator
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = config::AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        port = cfg.server.port,
        feed = %cfg.feed.provider,
        refresh_interval_secs = cfg.feed.refresh_interval_secs,
        initial_balance = %cfg.trading.initial_balance,
        "PredictHub starting up"
    );

    // -- Restore or create the ledger --------------------------------------

    let ledger = match storage::load_ledger(None)? {
        Some(l) => {
            info!(
                balance = %l.balance(),
                positions = l.positions().len(),
                watched = l.watchlist().len(),
                "Resumed from saved ledger"
            );
            l
        }
        None => {
            let l = Ledger::new(cfg.trading.initial_balance);
            info!(balance = %l.balance(), "Fresh ledger");
            l
        }
    };

    // -- Market feed --------------------------------------------------------

    let feed: Box<dyn QuoteSource> = match cfg.feed.provider.as_str() {
        "gamma" => {
            info!("Using Polymarket Gamma market feed");
            Box::new(GammaClient::new(cfg.feed.fetch_limit)?)
        }
        "catalog" => {
            info!("Using built-in catalog market feed");
            Box::new(CatalogFeed::new(Box::new(DriftTicks::new())))
        }
        other => {
            warn!(provider = other, "Unknown feed provider, defaulting to catalog");
            Box::new(CatalogFeed::new(Box::new(DriftTicks::new())))
        }
    };

    // -- Narrative service ---------------------------------------------------

    let narrative_key = std::env::var(&cfg.narrative.api_key_env).unwrap_or_default();
    let narrative: Option<Box<dyn NarrativeGenerator>> = if narrative_key.is_empty() {
        warn!("No narrative API key configured — serving local insights only");
        None
    } else {
        match cfg.narrative.provider.as_str() {
            "gemini" => {
                info!(model = %cfg.narrative.model, "Using Gemini narrative provider");
                Some(Box::new(GeminiClient::new(
                    narrative_key,
                    Some(cfg.narrative.model.clone()),
                    Some(cfg.narrative.max_tokens),
                )?))
            }
            other => {
                warn!(provider = other, "Unknown narrative provider, disabling narratives");
                None
            }
        }
    };

    // -- Shared state + server ----------------------------------------------

    let mut api_state = ApiState::new(ledger, Vec::new())
        .with_persistence(storage::DEFAULT_STATE_FILE.to_string());
    if let Some(n) = narrative {
        api_state = api_state.with_narrative(n);
    }
    let state: AppState = Arc::new(api_state);

    // Prime the snapshot before serving so the first page load has data
    refresh_markets(feed.as_ref(), &state).await;

    spawn_server(state.clone(), cfg.server.port)?;

    // -- Refresh loop --------------------------------------------------------

    let mut interval =
        tokio::time::interval(Duration::from_secs(cfg.feed.refresh_interval_secs));
    interval.tick().await; // First tick fires immediately; snapshot is already primed
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.feed.refresh_interval_secs,
        "Entering refresh loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                refresh_markets(feed.as_ref(), &state).await;
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    // Save final ledger state
    {
        let ledger = state.ledger.read().await;
        if let Err(e) = storage::save_ledger(&ledger, None) {
            error!(error = %e, "Failed to save ledger on shutdown");
        }
        info!(
            balance = %ledger.balance(),
            positions = ledger.positions().len(),
            "PredictHub shut down cleanly."
        );
    }

    Ok(())
}

/// Fetch a fresh market snapshot and swap it in atomically. A failed
/// fetch keeps the last-known snapshot so ledger reads stay consistent.
async fn refresh_markets(feed: &dyn QuoteSource, state: &AppState) {
    match feed.fetch_markets().await {
        Ok(markets) => {
            info!(count = markets.len(), source = feed.name(), "Market snapshot refreshed");
            *state.markets.write().await = markets;
        }
        Err(e) => {
            warn!(
                error = %e,
                source = feed.name(),
                "Refresh failed — keeping last-known snapshot"
            );
        }
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("predicthub=info"));

    let json_logging = std::env::var("PREDICTHUB_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
