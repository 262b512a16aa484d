//! Shared types for PredictHub.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that feed, engine, ledger,
//! and server modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lossy f64 → Decimal conversion for values arriving from JSON feeds.
pub fn d(v: f64) -> Decimal {
    Decimal::from_f64(v).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Platforms
// ---------------------------------------------------------------------------

/// The fixed set of quote venues the aggregator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformId {
    Polymarket,
    Kalshi,
    PredictIt,
    Manifold,
    Smarkets,
    Betfair,
}

impl PlatformId {
    /// All known platforms (useful for iteration).
    pub const ALL: &'static [PlatformId] = &[
        PlatformId::Polymarket,
        PlatformId::Kalshi,
        PlatformId::PredictIt,
        PlatformId::Manifold,
        PlatformId::Smarkets,
        PlatformId::Betfair,
    ];
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformId::Polymarket => write!(f, "Polymarket"),
            PlatformId::Kalshi => write!(f, "Kalshi"),
            PlatformId::PredictIt => write!(f, "PredictIt"),
            PlatformId::Manifold => write!(f, "Manifold"),
            PlatformId::Smarkets => write!(f, "Smarkets"),
            PlatformId::Betfair => write!(f, "Betfair"),
        }
    }
}

/// Attempt to parse a string into a PlatformId (case-insensitive).
impl std::str::FromStr for PlatformId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "polymarket" | "poly" => Ok(PlatformId::Polymarket),
            "kalshi" => Ok(PlatformId::Kalshi),
            "predictit" => Ok(PlatformId::PredictIt),
            "manifold" => Ok(PlatformId::Manifold),
            "smarkets" => Ok(PlatformId::Smarkets),
            "betfair" => Ok(PlatformId::Betfair),
            _ => Err(anyhow::anyhow!("Unknown platform: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Quote board
// ---------------------------------------------------------------------------

/// Per-platform YES quotes for a single market, as percentages in [0, 100].
///
/// A `None` entry means "no quote from that platform" — a market with
/// zero quotes is valid and simply has no derived prices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteBoard {
    pub polymarket: Option<Decimal>,
    pub kalshi: Option<Decimal>,
    pub predictit: Option<Decimal>,
    pub manifold: Option<Decimal>,
    pub smarkets: Option<Decimal>,
    pub betfair: Option<Decimal>,
}

impl QuoteBoard {
    pub fn get(&self, platform: PlatformId) -> Option<Decimal> {
        match platform {
            PlatformId::Polymarket => self.polymarket,
            PlatformId::Kalshi => self.kalshi,
            PlatformId::PredictIt => self.predictit,
            PlatformId::Manifold => self.manifold,
            PlatformId::Smarkets => self.smarkets,
            PlatformId::Betfair => self.betfair,
        }
    }

    pub fn set(&mut self, platform: PlatformId, quote: Option<Decimal>) {
        let slot = match platform {
            PlatformId::Polymarket => &mut self.polymarket,
            PlatformId::Kalshi => &mut self.kalshi,
            PlatformId::PredictIt => &mut self.predictit,
            PlatformId::Manifold => &mut self.manifold,
            PlatformId::Smarkets => &mut self.smarkets,
            PlatformId::Betfair => &mut self.betfair,
        };
        *slot = quote;
    }

    /// Present quotes paired with their platform, in `PlatformId::ALL` order.
    pub fn quotes(&self) -> Vec<(PlatformId, Decimal)> {
        PlatformId::ALL
            .iter()
            .filter_map(|&p| self.get(p).map(|q| (p, q)))
            .collect()
    }

    /// Present quote values only, in `PlatformId::ALL` order.
    pub fn values(&self) -> Vec<Decimal> {
        self.quotes().into_iter().map(|(_, q)| q).collect()
    }

    /// Number of platforms currently quoting this market.
    pub fn quote_count(&self) -> usize {
        PlatformId::ALL.iter().filter(|&&p| self.get(p).is_some()).count()
    }

    /// The consensus price: round-half-up mean of present quotes.
    /// `None` when no platform quotes the market.
    pub fn consensus(&self) -> Option<Decimal> {
        let vals = self.values();
        if vals.is_empty() {
            return None;
        }
        let sum: Decimal = vals.iter().copied().sum();
        let mean = sum / Decimal::from(vals.len() as u64);
        Some(mean.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
    }

    /// The arbitrage gap: spread between the highest and lowest quote.
    /// Zero when fewer than two platforms quote the market.
    pub fn arb_gap(&self) -> Decimal {
        let vals = self.values();
        if vals.len() < 2 {
            return Decimal::ZERO;
        }
        match (vals.iter().copied().max(), vals.iter().copied().min()) {
            (Some(hi), Some(lo)) => hi - lo,
            _ => Decimal::ZERO,
        }
    }

    /// The cheapest venue to buy YES on right now, if any platform quotes.
    pub fn best_buy(&self) -> Option<(PlatformId, Decimal)> {
        self.quotes().into_iter().min_by_key(|&(_, q)| q)
    }
}

impl fmt::Display for QuoteBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quotes = self.quotes();
        if quotes.is_empty() {
            return write!(f, "No quotes");
        }
        let parts: Vec<String> = quotes
            .iter()
            .map(|(p, q)| format!("{p}: {q}¢"))
            .collect();
        write!(f, "{}", parts.join(" | "))
    }
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// A prediction market event, quoted across platforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub question: String,
    /// Free-text classification tag ("Economics", "Tech", ...).
    pub category: String,
    pub quotes: QuoteBoard,
    /// Descriptive volume label ("$14.2M"); opaque to the engine.
    pub volume: String,
    /// Descriptive end label ("Mar 2026"); opaque to the engine.
    pub ends: String,
    /// Whether this event was matched across multiple platforms.
    #[serde(default)]
    pub matched: bool,
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({} | vol: {} | ends: {})",
            self.category, self.question, self.quotes, self.volume, self.ends,
        )
    }
}

impl Market {
    /// Helper to build a test market with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        use rust_decimal_macros::dec;
        Market {
            id: "m1".to_string(),
            question: "Fed Interest Rate cut in March 2026?".to_string(),
            category: "Economics".to_string(),
            quotes: QuoteBoard {
                polymarket: Some(dec!(64)),
                kalshi: Some(dec!(61)),
                predictit: Some(dec!(68)),
                ..Default::default()
            },
            volume: "$14.2M".to_string(),
            ends: "Mar 2026".to_string(),
            matched: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Sides & positions
// ---------------------------------------------------------------------------

/// Which outcome a paper position backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Yes,
    No,
}

impl Side {
    /// The opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// An open paper-trading position.
///
/// Created by `Ledger::open_position`, removed by `Ledger::close_position`.
/// Never modified in between.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub market_id: String,
    /// Denormalised question label, kept so the position stays readable
    /// even if the market drops out of the feed.
    pub market_question: String,
    pub side: Side,
    /// Implied probability (fraction in [0, 1]) at open time.
    pub entry_price: Decimal,
    /// Whole shares purchased: floor(amount / entry_price).
    pub shares: u64,
    /// Actual cost: shares × entry_price (≤ requested amount).
    pub amount_spent: Decimal,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Value of this position at the given mark price.
    pub fn mark_value(&self, mark: Decimal) -> Decimal {
        Decimal::from(self.shares) * mark
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} | {} shares @ {:.2} (${:.2}) [{}]",
            self.side, self.market_question, self.shares, self.entry_price,
            self.amount_spent, self.id,
        )
    }
}

/// Receipt returned when a position is closed and settled to cash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub position_id: String,
    /// Cash credited back: shares × current mark price.
    pub payout: Decimal,
    /// payout − amount_spent. Negative on a losing close.
    pub profit: Decimal,
    pub closed_at: DateTime<Utc>,
}

impl fmt::Display for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.profit >= Decimal::ZERO { "+" } else { "" };
        write!(
            f,
            "Settled {} for ${:.2} ({sign}{:.2})",
            self.position_id, self.payout, self.profit,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Ledger rejections. All are user-correctable input errors — callers
/// surface them and leave state untouched; none crash the process.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("Trade amount must be positive (got {0})")]
    InvalidAmount(Decimal),

    #[error("Market {0} has no price quotes")]
    InvalidMarket(String),

    #[error("${amount} buys zero whole shares at {entry_price:.2}")]
    ZeroShares { amount: Decimal, entry_price: Decimal },

    #[error("Insufficient balance: need ${needed:.2}, have ${available:.2}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    #[error("No open position with id {0}")]
    PositionNotFound(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
