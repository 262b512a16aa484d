//! Aggregation engine — derived prices and collection utilities.
//!
//! Derives the consensus price and arbitrage gap for each market
//! (see `QuoteBoard::consensus` / `QuoteBoard::arb_gap`) and provides
//! the filter / sort / rank operations the API surface is built on.
//!
//! All operations are pure: inputs are never mutated, derived fields are
//! recomputed from the quote board on every call and never cached.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Market;

// ---------------------------------------------------------------------------
// Market view
// ---------------------------------------------------------------------------

/// A market with its derived fields attached — the shape the API serves.
///
/// Derived fields are a function of the quote board at computation time;
/// they are never persisted as authoritative state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketView {
    #[serde(flatten)]
    pub market: Market,
    /// Round-half-up mean of present quotes; absent when no quotes.
    pub consensus: Option<Decimal>,
    /// max − min across present quotes; zero below two quotes.
    pub arb_gap: Decimal,
}

impl MarketView {
    pub fn derive(market: &Market) -> Self {
        Self {
            market: market.clone(),
            consensus: market.quotes.consensus(),
            arb_gap: market.quotes.arb_gap(),
        }
    }
}

/// Attach derived fields to a whole market list.
pub fn derive_all(markets: &[Market]) -> Vec<MarketView> {
    markets.iter().map(MarketView::derive).collect()
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Case-insensitive substring filter against question or category.
/// An empty query matches everything.
pub fn filter_markets(markets: &[Market], query: &str) -> Vec<Market> {
    let needle = query.to_lowercase();
    markets
        .iter()
        .filter(|m| {
            m.question.to_lowercase().contains(&needle)
                || m.category.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

/// Sortable columns of the market table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Question,
    Consensus,
    ArbGap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl std::str::FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "question" => Ok(SortKey::Question),
            "consensus" => Ok(SortKey::Consensus),
            "arb_gap" | "gap" => Ok(SortKey::ArbGap),
            _ => Err(anyhow::anyhow!("Unknown sort key: {s}")),
        }
    }
}

impl std::str::FromStr for SortDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            _ => Err(anyhow::anyhow!("Unknown sort direction: {s}")),
        }
    }
}

/// Stable sort by the given key and direction.
///
/// Ties keep their original relative order (required for a deterministic
/// table). Markets with no consensus order below every priced market when
/// sorting by consensus.
pub fn sort_markets(markets: &[Market], key: SortKey, direction: SortDirection) -> Vec<Market> {
    let mut sorted = markets.to_vec();
    sorted.sort_by(|a, b| {
        let ord = match key {
            SortKey::Question => a.question.cmp(&b.question),
            SortKey::Consensus => a.quotes.consensus().cmp(&b.quotes.consensus()),
            SortKey::ArbGap => a.quotes.arb_gap().cmp(&b.quotes.arb_gap()),
        };
        match direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
    sorted
}

// ---------------------------------------------------------------------------
// Opportunity ranking
// ---------------------------------------------------------------------------

/// Markets whose arbitrage gap meets the threshold, widest gap first.
///
/// Ties keep their original relative order. No qualifying market yields
/// an empty list, not an error.
pub fn rank_by_threshold(markets: &[Market], threshold: Decimal) -> Vec<Market> {
    let mut qualifying: Vec<Market> = markets
        .iter()
        .filter(|m| m.quotes.arb_gap() >= threshold)
        .cloned()
        .collect();
    qualifying.sort_by(|a, b| b.quotes.arb_gap().cmp(&a.quotes.arb_gap()));
    qualifying
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
