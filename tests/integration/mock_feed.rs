//! Mock quote source for integration testing.
//!
//! Provides a deterministic `QuoteSource` implementation that returns
//! known markets and can be forced into failure — all in-memory with
//! no external dependencies.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};

use predicthub::feed::QuoteSource;
use predicthub::types::{Market, QuoteBoard};

/// A mock quote source for deterministic testing.
///
/// All state is in-memory. Markets are fully controllable from
/// test code.
pub struct MockFeed {
    name: String,
    markets: Arc<Mutex<Vec<Market>>>,
    /// If set, all fetches will return this error.
    force_error: Arc<Mutex<Option<String>>>,
}

impl MockFeed {
    /// Create a new mock feed with the default market set.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            markets: Arc::new(Mutex::new(Self::default_markets())),
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a mock feed with custom markets.
    pub fn with_markets(name: &str, markets: Vec<Market>) -> Self {
        Self {
            name: name.to_string(),
            markets: Arc::new(Mutex::new(markets)),
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Force all subsequent fetches to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    /// Clear any forced error.
    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    /// Replace the served markets (simulates a feed update).
    pub fn set_markets(&self, markets: Vec<Market>) {
        *self.markets.lock().unwrap() = markets;
    }

    /// A default set of markets with known quotes for deterministic
    /// consensus and arb-gap assertions.
    fn default_markets() -> Vec<Market> {
        vec![
            Market {
                id: "MOCK-EC-001".to_string(),
                question: "Will the Fed cut rates in March 2026?".to_string(),
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
            },
            Market {
                id: "MOCK-CR-001".to_string(),
                question: "Bitcoin above $150k by December 2026?".to_string(),
                category: "Crypto".to_string(),
                quotes: QuoteBoard {
                    polymarket: Some(dec!(55)),
                    manifold: Some(dec!(58)),
                    ..Default::default()
                },
                volume: "$22.1M".to_string(),
                ends: "Dec 2026".to_string(),
                matched: true,
            },
            Market {
                id: "MOCK-SP-001".to_string(),
                question: "Will Team A win the Grand Final?".to_string(),
                category: "Sports".to_string(),
                quotes: QuoteBoard {
                    smarkets: Some(dec!(14)),
                    betfair: Some(dec!(15)),
                    manifold: Some(dec!(12)),
                    ..Default::default()
                },
                volume: "$45.0M".to_string(),
                ends: "Jul 2026".to_string(),
                matched: false,
            },
            // A single-quote market: valid, but degenerate derived fields
            Market {
                id: "MOCK-OT-001".to_string(),
                question: "Will a specific cultural event happen?".to_string(),
                category: "Culture".to_string(),
                quotes: QuoteBoard {
                    manifold: Some(dec!(50)),
                    ..Default::default()
                },
                volume: "$100k".to_string(),
                ends: "Dec 2026".to_string(),
                matched: false,
            },
            // A quoteless market: still valid in the table, untradeable
            Market {
                id: "MOCK-EM-001".to_string(),
                question: "Unlisted event with no quotes yet?".to_string(),
                category: "Other".to_string(),
                quotes: QuoteBoard::default(),
                volume: "N/A".to_string(),
                ends: "TBD".to_string(),
                matched: false,
            },
        ]
    }
}

#[async_trait]
impl QuoteSource for MockFeed {
    async fn fetch_markets(&self) -> Result<Vec<Market>> {
        if let Some(err) = self.force_error.lock().unwrap().as_ref() {
            return Err(anyhow!("{}", err));
        }
        Ok(self.markets.lock().unwrap().clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use predicthub::engine;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_mock_fetch_markets() {
        let feed = MockFeed::new("test-feed");
        let markets = feed.fetch_markets().await.unwrap();
        assert_eq!(markets.len(), 5);
        assert!(markets.iter().any(|m| m.category == "Economics"));
        assert!(markets.iter().any(|m| m.category == "Crypto"));
        assert!(markets.iter().any(|m| m.category == "Sports"));
    }

    #[tokio::test]
    async fn test_mock_derived_fields() {
        let feed = MockFeed::new("test-feed");
        let markets = feed.fetch_markets().await.unwrap();
        let views = engine::derive_all(&markets);

        let fed = views.iter().find(|v| v.market.id == "MOCK-EC-001").unwrap();
        assert_eq!(fed.consensus, Some(dec!(64))); // (64+61+68)/3 → 64
        assert_eq!(fed.arb_gap, dec!(7));

        let single = views.iter().find(|v| v.market.id == "MOCK-OT-001").unwrap();
        assert_eq!(single.consensus, Some(dec!(50)));
        assert_eq!(single.arb_gap, Decimal::ZERO);

        let empty = views.iter().find(|v| v.market.id == "MOCK-EM-001").unwrap();
        assert_eq!(empty.consensus, None);
        assert_eq!(empty.arb_gap, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_mock_forced_error() {
        let feed = MockFeed::new("test-feed");
        feed.set_error("simulated network outage");
        assert!(feed.fetch_markets().await.is_err());

        feed.clear_error();
        assert!(feed.fetch_markets().await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_custom_markets() {
        let custom = vec![Market {
            id: "CUSTOM-001".to_string(),
            question: "Custom test market".to_string(),
            category: "Other".to_string(),
            quotes: QuoteBoard {
                polymarket: Some(dec!(50)),
                kalshi: Some(dec!(50)),
                ..Default::default()
            },
            volume: "$1.0M".to_string(),
            ends: "Dec 2026".to_string(),
            matched: false,
        }];

        let feed = MockFeed::with_markets("custom", custom);
        let markets = feed.fetch_markets().await.unwrap();
        assert_eq!(markets.len(), 1);
        assert_eq!(markets[0].id, "CUSTOM-001");
    }

    #[tokio::test]
    async fn test_mock_feed_update_replaces_snapshot() {
        let feed = MockFeed::new("test-feed");
        feed.set_markets(Vec::new());
        let markets = feed.fetch_markets().await.unwrap();
        assert!(markets.is_empty());
    }

    #[tokio::test]
    async fn test_mock_feed_name() {
        let feed = MockFeed::new("test-feed");
        assert_eq!(feed.name(), "test-feed");
    }
}
