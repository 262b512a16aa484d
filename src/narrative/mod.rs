//! AI market narratives.
//!
//! Defines the `NarrativeGenerator` trait and provides the Gemini
//! implementation plus a local, zero-dependency fallback. The engine and
//! ledger never depend on a narrative succeeding — a failed generation
//! degrades to the local insights.

pub mod gemini;
pub mod local;

use anyhow::Result;
use async_trait::async_trait;

use crate::engine::MarketView;

/// Abstraction over natural-language market summarisers.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// Beginner-friendly briefing over the whole market table.
    async fn market_briefing(&self, markets: &[MarketView]) -> Result<String>;

    /// Short brief on a single market's cross-platform pricing.
    async fn market_deep_dive(&self, market: &MarketView) -> Result<String>;

    /// Model identifier string.
    fn model_name(&self) -> &str;
}

/// One dataset line per market, shared by both prompt builders.
pub(crate) fn dataset_line(view: &MarketView) -> String {
    let consensus = view
        .consensus
        .map(|c| c.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    format!(
        "[{}] {} | Mid-Price: {}% | Price Difference: {}% | Volume: {}",
        view.market.category, view.market.question, consensus, view.arb_gap, view.market.volume,
    )
}
