//! Market quote sources.
//!
//! Defines the `QuoteSource` trait and provides implementations for:
//! - Polymarket Gamma — live market data, with sibling-platform quotes
//!   derived by the spread model
//! - Catalog — the built-in demo market list, driven by an injectable
//!   tick source for simulated liveness

pub mod catalog;
pub mod gamma;
pub mod sim;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::Market;

/// Abstraction over market quote providers.
///
/// A source may be stale, partial, or temporarily unavailable — callers
/// degrade gracefully by keeping the last-known market snapshot when a
/// fetch fails.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch the current market list with per-platform quotes.
    async fn fetch_markets(&self) -> Result<Vec<Market>>;

    /// Source name for logging and identification.
    fn name(&self) -> &str;
}
