//! Polymarket Gamma market data integration.
//!
//! Read-only passthrough of the public Gamma REST API. Polymarket is the
//! only venue quoted live; sibling Kalshi/PredictIt quotes are derived
//! from the Polymarket price via the deterministic spread model so the
//! comparison table always has a cross-platform picture.
//!
//! API docs: https://docs.polymarket.com/
//! Base URL: https://gamma-api.polymarket.com
//! Auth: not required for reads.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use tracing::debug;

use super::sim::sibling_offset;
use super::QuoteSource;
use crate::types::{d, Market, PlatformId, QuoteBoard};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const BASE_URL: &str = "https://gamma-api.polymarket.com";
const SOURCE_NAME: &str = "gamma";

/// Default number of markets to fetch per refresh.
const DEFAULT_FETCH_LIMIT: u32 = 20;

// ---------------------------------------------------------------------------
// API response types (Gamma JSON → Rust)
// ---------------------------------------------------------------------------

/// Gamma market record — we only deserialize the fields we need.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaMarket {
    id: String,
    question: String,

    /// Group/series title, used as the category tag.
    #[serde(default)]
    group_item_title: Option<String>,

    /// Outcome prices (0.0–1.0); first entry is the YES price.
    #[serde(default)]
    outcome_prices: Option<Vec<f64>>,

    /// Lifetime volume in USD.
    #[serde(default)]
    volume: f64,

    /// Market end timestamp (RFC 3339). May be absent.
    #[serde(default)]
    end_date: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Polymarket Gamma quote source.
pub struct GammaClient {
    http: Client,
    limit: u32,
}

impl GammaClient {
    pub fn new(limit: Option<u32>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("PredictHub/0.1.0 (market-aggregator)")
            .build()
            .context("Failed to build HTTP client for Gamma")?;

        Ok(Self {
            http,
            limit: limit.unwrap_or(DEFAULT_FETCH_LIMIT),
        })
    }

    /// Convert a Gamma record to the unified market shape, deriving
    /// sibling-platform quotes from the Polymarket price.
    fn to_market(gm: GammaMarket) -> Market {
        let yes_price = gm
            .outcome_prices
            .as_ref()
            .and_then(|p| p.first().copied())
            .unwrap_or(0.5);
        let base = (d(yes_price) * dec!(100))
            .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero);

        let clamp = |q: Decimal| q.max(dec!(0)).min(dec!(100));
        let quotes = QuoteBoard {
            polymarket: Some(base),
            kalshi: Some(clamp(base + sibling_offset(&gm.id, PlatformId::Kalshi, dec!(2)))),
            predictit: Some(clamp(base + sibling_offset(&gm.id, PlatformId::PredictIt, dec!(1)))),
            ..Default::default()
        };

        Market {
            id: gm.id,
            question: gm.question,
            category: gm
                .group_item_title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "General".to_string()),
            quotes,
            volume: format!("${:.1}M", gm.volume / 1_000_000.0),
            ends: gm
                .end_date
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.format("%b %Y").to_string())
                .unwrap_or_else(|| "TBD".to_string()),
            matched: true,
        }
    }
}

#[async_trait]
impl QuoteSource for GammaClient {
    async fn fetch_markets(&self) -> Result<Vec<Market>> {
        let url = format!(
            "{BASE_URL}/markets?active=true&limit={}&order=volume&ascending=false",
            self.limit,
        );

        debug!(url = %url, "Fetching Gamma markets");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("Gamma API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Gamma API error {status}: {body}");
        }

        let records: Vec<GammaMarket> = resp
            .json()
            .await
            .context("Failed to parse Gamma markets response")?;

        Ok(records.into_iter().map(Self::to_market).collect())
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
