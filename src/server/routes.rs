//! API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ApiState>`; trade
//! and watchlist handlers hold the ledger write lock across the whole
//! validate-and-commit sequence, then persist before responding.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, warn};

use crate::engine::{self, MarketView, SortDirection, SortKey};
use crate::ledger::{Ledger, MarkedPosition};
use crate::narrative::local::{local_insights, render_briefing, Insight};
use crate::narrative::NarrativeGenerator;
use crate::storage;
use crate::types::{LedgerError, Market, Position, Settlement, Side};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ApiState {
    pub ledger: RwLock<Ledger>,
    /// Last-known market snapshot; replaced atomically by the refresh
    /// loop. Ledger reads never wait on a fetch in flight.
    pub markets: RwLock<Vec<Market>>,
    pub narrative: Option<Box<dyn NarrativeGenerator>>,
    /// Ledger state file. `None` disables persistence (tests).
    pub persist_path: Option<String>,
}

impl ApiState {
    pub fn new(ledger: Ledger, markets: Vec<Market>) -> Self {
        Self {
            ledger: RwLock::new(ledger),
            markets: RwLock::new(markets),
            narrative: None,
            persist_path: None,
        }
    }

    pub fn with_narrative(mut self, narrative: Box<dyn NarrativeGenerator>) -> Self {
        self.narrative = Some(narrative);
        self
    }

    pub fn with_persistence(mut self, path: String) -> Self {
        self.persist_path = Some(path);
        self
    }

    /// Write the ledger to disk after a successful mutation.
    fn persist(&self, ledger: &Ledger) {
        if let Some(path) = &self.persist_path {
            if let Err(e) = storage::save_ledger(ledger, Some(path)) {
                error!(error = %e, path, "Failed to persist ledger");
            }
        }
    }
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct MarketsQuery {
    #[serde(default)]
    pub q: String,
    pub sort: Option<String>,
    pub dir: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OpportunitiesQuery {
    pub threshold: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct OpenRequest {
    pub market_id: String,
    pub side: Side,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CloseRequest {
    pub position_id: String,
}

#[derive(Debug, Deserialize)]
pub struct WatchRequest {
    pub market_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WatchResponse {
    pub market_id: String,
    pub watched: bool,
}

#[derive(Debug, Serialize)]
pub struct PortfolioResponse {
    pub balance: Decimal,
    pub total_value: Decimal,
    pub positions: Vec<MarkedPosition>,
    pub watchlist: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct InsightsResponse {
    /// "gemini" when the narrative service produced the briefing,
    /// "local" for the built-in fallback.
    pub source: String,
    pub briefing: String,
    pub insights: Vec<Insight>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Map a ledger rejection to an HTTP response. Unknown markets and
/// positions are 404; the rest are user-correctable 422s.
fn reject(e: LedgerError) -> (StatusCode, Json<ErrorBody>) {
    let status = match e {
        LedgerError::InvalidMarket(_) | LedgerError::PositionNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (status, Json(ErrorBody { error: e.to_string() }))
}

// ---------------------------------------------------------------------------
// Market routes
// ---------------------------------------------------------------------------

/// GET /api/markets?q=&sort=&dir=
pub async fn get_markets(
    State(state): State<AppState>,
    Query(query): Query<MarketsQuery>,
) -> Json<Vec<MarketView>> {
    let markets = state.markets.read().await;
    let mut filtered = engine::filter_markets(&markets, &query.q);

    if let Some(key) = query.sort.as_deref().and_then(|s| s.parse::<SortKey>().ok()) {
        let dir = query
            .dir
            .as_deref()
            .and_then(|s| s.parse::<SortDirection>().ok())
            .unwrap_or(SortDirection::Ascending);
        filtered = engine::sort_markets(&filtered, key, dir);
    }

    Json(engine::derive_all(&filtered))
}

/// GET /api/opportunities?threshold=
pub async fn get_opportunities(
    State(state): State<AppState>,
    Query(query): Query<OpportunitiesQuery>,
) -> Json<Vec<MarketView>> {
    let markets = state.markets.read().await;
    let threshold = query.threshold.unwrap_or(Decimal::from(5));
    Json(engine::derive_all(&engine::rank_by_threshold(&markets, threshold)))
}

// ---------------------------------------------------------------------------
// Trading routes
// ---------------------------------------------------------------------------

/// POST /api/trade/open
pub async fn open_trade(
    State(state): State<AppState>,
    Json(req): Json<OpenRequest>,
) -> Result<Json<Position>, (StatusCode, Json<ErrorBody>)> {
    let market = {
        let markets = state.markets.read().await;
        markets.iter().find(|m| m.id == req.market_id).cloned()
    };
    let market = market.ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: format!("Unknown market: {}", req.market_id),
            }),
        )
    })?;

    let mut ledger = state.ledger.write().await;
    let position = ledger
        .open_position(&market, req.side, req.amount)
        .map_err(reject)?;
    state.persist(&ledger);

    Ok(Json(position))
}

/// POST /api/trade/close
pub async fn close_trade(
    State(state): State<AppState>,
    Json(req): Json<CloseRequest>,
) -> Result<Json<Settlement>, (StatusCode, Json<ErrorBody>)> {
    let markets = state.markets.read().await.clone();

    let mut ledger = state.ledger.write().await;
    let settlement = ledger
        .close_position(&req.position_id, &markets)
        .map_err(reject)?;
    state.persist(&ledger);

    Ok(Json(settlement))
}

/// GET /api/portfolio
pub async fn get_portfolio(State(state): State<AppState>) -> Json<PortfolioResponse> {
    let markets = state.markets.read().await.clone();
    let ledger = state.ledger.read().await;

    Json(PortfolioResponse {
        balance: ledger.balance(),
        total_value: ledger.portfolio_value(&markets),
        positions: ledger.marked_positions(&markets),
        watchlist: ledger.watchlist().iter().cloned().collect(),
    })
}

/// POST /api/watchlist/toggle
pub async fn toggle_watchlist(
    State(state): State<AppState>,
    Json(req): Json<WatchRequest>,
) -> Json<WatchResponse> {
    let mut ledger = state.ledger.write().await;
    let watched = ledger.toggle_watch(&req.market_id);
    state.persist(&ledger);

    Json(WatchResponse {
        market_id: req.market_id,
        watched,
    })
}

// ---------------------------------------------------------------------------
// Insights route
// ---------------------------------------------------------------------------

/// GET /api/insights
///
/// Generation failures degrade to the local insights with a 502 so the
/// panel can show the fallback; ledger state is never involved.
pub async fn get_insights(
    State(state): State<AppState>,
) -> (StatusCode, Json<InsightsResponse>) {
    let views = {
        let markets = state.markets.read().await;
        engine::derive_all(&markets)
    };
    let insights = local_insights(&views);

    if let Some(narrative) = &state.narrative {
        match narrative.market_briefing(&views).await {
            Ok(briefing) => {
                return (
                    StatusCode::OK,
                    Json(InsightsResponse {
                        source: "gemini".to_string(),
                        briefing,
                        insights,
                    }),
                );
            }
            Err(e) => {
                warn!(error = %e, "Narrative generation failed, serving local fallback");
                return (
                    StatusCode::BAD_GATEWAY,
                    Json(InsightsResponse {
                        source: "local".to_string(),
                        briefing: render_briefing(&insights),
                        insights,
                    }),
                );
            }
        }
    }

    (
        StatusCode::OK,
        Json(InsightsResponse {
            source: "local".to_string(),
            briefing: render_briefing(&insights),
            insights,
        }),
    )
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::catalog::catalog;
    use rust_decimal_macros::dec;

    fn test_state() -> AppState {
        Arc::new(ApiState::new(Ledger::new(dec!(10000)), catalog()))
    }

    #[tokio::test]
    async fn test_get_markets_returns_catalog() {
        let Json(views) = get_markets(
            State(test_state()),
            Query(MarketsQuery {
                q: String::new(),
                sort: None,
                dir: None,
            }),
        )
        .await;
        assert_eq!(views.len(), 20);
        assert!(views.iter().all(|v| v.consensus.is_some()));
    }

    #[tokio::test]
    async fn test_get_markets_filters() {
        let Json(views) = get_markets(
            State(test_state()),
            Query(MarketsQuery {
                q: "bitcoin".to_string(),
                sort: None,
                dir: None,
            }),
        )
        .await;
        assert!(!views.is_empty());
        assert!(views
            .iter()
            .all(|v| v.market.question.to_lowercase().contains("bitcoin")));
    }

    #[tokio::test]
    async fn test_get_markets_sorts_by_gap() {
        let Json(views) = get_markets(
            State(test_state()),
            Query(MarketsQuery {
                q: String::new(),
                sort: Some("arb_gap".to_string()),
                dir: Some("desc".to_string()),
            }),
        )
        .await;
        for pair in views.windows(2) {
            assert!(pair[0].arb_gap >= pair[1].arb_gap);
        }
    }

    #[tokio::test]
    async fn test_get_opportunities_respects_threshold() {
        let Json(views) = get_opportunities(
            State(test_state()),
            Query(OpportunitiesQuery {
                threshold: Some(dec!(5)),
            }),
        )
        .await;
        assert!(views.iter().all(|v| v.arb_gap >= dec!(5)));
    }

    #[tokio::test]
    async fn test_open_trade_success() {
        let state = test_state();
        let result = open_trade(
            State(state.clone()),
            Json(OpenRequest {
                market_id: "m1".to_string(),
                side: Side::Yes,
                amount: dec!(100),
            }),
        )
        .await;

        let Json(position) = result.unwrap();
        assert_eq!(position.market_id, "m1");
        assert!(position.shares > 0);
        assert!(state.ledger.read().await.balance() < dec!(10000));
    }

    #[tokio::test]
    async fn test_open_trade_unknown_market_is_404() {
        let (status, _) = open_trade(
            State(test_state()),
            Json(OpenRequest {
                market_id: "no-such-market".to_string(),
                side: Side::Yes,
                amount: dec!(100),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_open_trade_bad_amount_is_422() {
        let (status, Json(body)) = open_trade(
            State(test_state()),
            Json(OpenRequest {
                market_id: "m1".to_string(),
                side: Side::Yes,
                amount: dec!(0),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.error.contains("positive"));
    }

    #[tokio::test]
    async fn test_open_trade_insufficient_balance_is_422() {
        let (status, _) = open_trade(
            State(test_state()),
            Json(OpenRequest {
                market_id: "m1".to_string(),
                side: Side::Yes,
                amount: dec!(99999),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_close_trade_roundtrip() {
        let state = test_state();
        let Json(position) = open_trade(
            State(state.clone()),
            Json(OpenRequest {
                market_id: "m1".to_string(),
                side: Side::Yes,
                amount: dec!(100),
            }),
        )
        .await
        .unwrap();

        let Json(settlement) = close_trade(
            State(state.clone()),
            Json(CloseRequest {
                position_id: position.id,
            }),
        )
        .await
        .unwrap();

        // Consensus unchanged between open and close → break-even
        assert_eq!(settlement.payout, position.amount_spent);
        assert_eq!(settlement.profit, dec!(0));
        assert_eq!(state.ledger.read().await.balance(), dec!(10000));
    }

    #[tokio::test]
    async fn test_close_trade_unknown_position_is_404() {
        let (status, _) = close_trade(
            State(test_state()),
            Json(CloseRequest {
                position_id: "nonexistent".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_portfolio_reflects_open_position() {
        let state = test_state();
        open_trade(
            State(state.clone()),
            Json(OpenRequest {
                market_id: "m1".to_string(),
                side: Side::Yes,
                amount: dec!(100),
            }),
        )
        .await
        .unwrap();

        let Json(portfolio) = get_portfolio(State(state)).await;
        assert_eq!(portfolio.positions.len(), 1);
        // Opening at the current mark leaves total value unchanged
        assert_eq!(portfolio.total_value, dec!(10000));
        assert!(portfolio.balance < dec!(10000));
    }

    #[tokio::test]
    async fn test_watchlist_toggle() {
        let state = test_state();
        let Json(resp) = toggle_watchlist(
            State(state.clone()),
            Json(WatchRequest {
                market_id: "m3".to_string(),
            }),
        )
        .await;
        assert!(resp.watched);

        let Json(resp) = toggle_watchlist(
            State(state.clone()),
            Json(WatchRequest {
                market_id: "m3".to_string(),
            }),
        )
        .await;
        assert!(!resp.watched);
    }

    #[tokio::test]
    async fn test_insights_fall_back_to_local() {
        let (status, Json(resp)) = get_insights(State(test_state())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp.source, "local");
        assert!(!resp.insights.is_empty());
        assert!(resp.briefing.contains("[STRATEGIC RECOMMENDATION]"));
    }

    #[tokio::test]
    async fn test_insights_502_on_narrative_failure() {
        struct FailingNarrative;

        #[async_trait::async_trait]
        impl NarrativeGenerator for FailingNarrative {
            async fn market_briefing(&self, _: &[MarketView]) -> anyhow::Result<String> {
                anyhow::bail!("service unreachable")
            }
            async fn market_deep_dive(&self, _: &MarketView) -> anyhow::Result<String> {
                anyhow::bail!("service unreachable")
            }
            fn model_name(&self) -> &str {
                "failing"
            }
        }

        let state = Arc::new(
            ApiState::new(Ledger::new(dec!(10000)), catalog())
                .with_narrative(Box::new(FailingNarrative)),
        );
        let (status, Json(resp)) = get_insights(State(state.clone())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(resp.source, "local");
        assert!(!resp.briefing.is_empty());
        // A failed narrative never touches the ledger
        assert_eq!(state.ledger.read().await.balance(), dec!(10000));
    }
}
