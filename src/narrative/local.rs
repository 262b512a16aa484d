//! Local insight generation.
//!
//! Produces the briefing panel's content without any external service:
//! top arbitrage gaps with the best venue to buy on, a volume-leader
//! verdict, and a strategic recommendation. Used when no narrative API
//! key is configured and as the fallback when generation fails.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::engine::MarketView;
use crate::types::PlatformId;

/// Markets count as divergent above this gap (percent points).
const DIVERGENCE_THRESHOLD: Decimal = dec!(3);

/// A single card on the insights panel.
#[derive(Debug, Clone, Serialize)]
pub struct Insight {
    pub title: String,
    pub content: String,
    pub kind: InsightKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Opportunity,
    Verdict,
    Alert,
}

/// Parse a display volume label ("$14.2M", "$900k") into dollars for
/// ranking. Unparseable labels rank at zero.
fn volume_dollars(label: &str) -> f64 {
    let numeric: String = label
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value: f64 = numeric.parse().unwrap_or(0.0);
    let lower = label.to_lowercase();
    if lower.contains('b') {
        value * 1_000_000_000.0
    } else if lower.contains('m') {
        value * 1_000_000.0
    } else if lower.contains('k') {
        value * 1_000.0
    } else {
        value
    }
}

/// Build the insight cards from the current market table.
pub fn local_insights(markets: &[MarketView]) -> Vec<Insight> {
    let mut insights = Vec::new();

    // Top price gaps, widest first
    let mut by_gap: Vec<&MarketView> = markets.iter().collect();
    by_gap.sort_by(|a, b| b.arb_gap.cmp(&a.arb_gap));
    let top_gaps: Vec<&MarketView> = by_gap
        .into_iter()
        .filter(|v| v.arb_gap > Decimal::ZERO)
        .take(2)
        .collect();

    if !top_gaps.is_empty() {
        let content = top_gaps
            .iter()
            .map(|v| {
                let (venue, price) = v
                    .market
                    .quotes
                    .best_buy()
                    .map(|(p, q)| (p.to_string(), q.to_string()))
                    .unwrap_or_else(|| ("Unknown".to_string(), "N/A".to_string()));
                format!(
                    "• {}\n  BEST BUY: {venue} at {price}%\n  SAVINGS: {}% vs Market Average.",
                    v.market.question, v.arb_gap,
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        insights.push(Insight {
            title: "Arbitrage Alerts".to_string(),
            content,
            kind: InsightKind::Opportunity,
        });
    }

    // Volume leader
    if let Some(leader) = markets
        .iter()
        .max_by(|a, b| {
            volume_dollars(&a.market.volume)
                .total_cmp(&volume_dollars(&b.market.volume))
        })
    {
        insights.push(Insight {
            title: "Market Leader Verdict".to_string(),
            content: format!(
                "High-liquidity detected in \"{}\".\n\nPolymarket currently leads \
                 in depth for this sector with {} in active volume. Spreads are \
                 tightest on centralized exchanges.",
                leader.market.question, leader.market.volume,
            ),
            kind: InsightKind::Verdict,
        });
    }

    // Strategic recommendation
    let divergent = markets
        .iter()
        .filter(|v| v.arb_gap > DIVERGENCE_THRESHOLD)
        .count();
    insights.push(Insight {
        title: "Strategic Recommendation".to_string(),
        content: format!(
            "Detected {divergent} markets with >{DIVERGENCE_THRESHOLD}% price \
             divergence.\n\nStrategy: Execute \"Buy Low\" on {} and hedge on {} \
             to lock in delta-neutral gains.",
            PlatformId::Polymarket,
            PlatformId::Kalshi,
        ),
        kind: InsightKind::Alert,
    });

    insights
}

/// Render the insight cards as a single briefing string, in the same
/// `[HEADER]` format the narrative API is asked to produce.
pub fn render_briefing(insights: &[Insight]) -> String {
    insights
        .iter()
        .map(|i| format!("[{}]\n{}", i.title.to_uppercase(), i.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
