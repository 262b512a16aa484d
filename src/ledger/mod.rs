//! Paper-trading ledger — virtual cash, positions, and watchlist.
//!
//! The ledger consumes a market's consensus price as its oracle and owns
//! no other shared state. Every operation validates fully before touching
//! state, so a rejected call leaves the ledger exactly as it was.
//!
//! Callers are responsible for serialising access (the server wraps the
//! ledger in a `tokio::sync::RwLock` and holds the write guard across a
//! whole open/close), so two concurrent opens can never both pass the
//! balance check against a stale balance.

use chrono::Utc;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::{LedgerError, Market, Position, Settlement, Side};

/// Implied share price (fraction in [0, 1]) for a side at the given
/// consensus percentage: `consensus/100` for YES, `(100-consensus)/100`
/// for NO.
pub fn implied_price(consensus: Decimal, side: Side) -> Decimal {
    match side {
        Side::Yes => consensus / dec!(100),
        Side::No => (dec!(100) - consensus) / dec!(100),
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Cash balance plus the set of open positions and the watchlist.
///
/// Invariants:
/// - `balance` never goes negative.
/// - Positions are immutable between open and close; no partial closes.
/// - Total portfolio value (`balance` + marked positions) changes only
///   through explicit open/close calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    balance: Decimal,
    positions: Vec<Position>,
    watchlist: BTreeSet<String>,
}

/// An open position together with its live mark, as served by the API.
#[derive(Debug, Clone, Serialize)]
pub struct MarkedPosition {
    #[serde(flatten)]
    pub position: Position,
    /// Current implied price for the position's side, or the entry price
    /// when the market is currently unquoted.
    pub mark_price: Decimal,
    pub mark_value: Decimal,
    pub unrealized_pnl: Decimal,
}

impl Ledger {
    /// Create a fresh ledger with the given starting cash.
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            balance: initial_balance,
            positions: Vec::new(),
            watchlist: BTreeSet::new(),
        }
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn position(&self, position_id: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == position_id)
    }

    pub fn watchlist(&self) -> &BTreeSet<String> {
        &self.watchlist
    }

    pub fn is_watched(&self, market_id: &str) -> bool {
        self.watchlist.contains(market_id)
    }

    // -- Trading ---------------------------------------------------------

    /// Open a position on `market` at its current consensus price.
    ///
    /// Shares are whole: `floor(amount / entry_price)`. The floor residual
    /// (`amount - amount_spent`) is never debited. State is untouched on
    /// every rejection path.
    pub fn open_position(
        &mut self,
        market: &Market,
        side: Side,
        amount: Decimal,
    ) -> Result<Position, LedgerError> {
        let consensus = market
            .quotes
            .consensus()
            .ok_or_else(|| LedgerError::InvalidMarket(market.id.clone()))?;

        let entry_price = implied_price(consensus, side);
        if entry_price <= Decimal::ZERO {
            // A zero implied price is unpurchasable (consensus pinned at
            // 0 or 100 for this side).
            return Err(LedgerError::InvalidMarket(market.id.clone()));
        }

        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let shares = (amount / entry_price).floor().to_u64().unwrap_or(0);
        if shares == 0 {
            return Err(LedgerError::ZeroShares { amount, entry_price });
        }

        let amount_spent = Decimal::from(shares) * entry_price;
        if amount_spent > self.balance {
            return Err(LedgerError::InsufficientBalance {
                needed: amount_spent,
                available: self.balance,
            });
        }

        self.balance -= amount_spent;
        let position = Position {
            id: Uuid::new_v4().to_string(),
            market_id: market.id.clone(),
            market_question: market.question.clone(),
            side,
            entry_price,
            shares,
            amount_spent,
            opened_at: Utc::now(),
        };
        self.positions.push(position.clone());

        info!(
            position_id = %position.id,
            market_id = %market.id,
            side = %side,
            shares,
            spent = %amount_spent,
            balance = %self.balance,
            "Position opened"
        );

        Ok(position)
    }

    /// Close a position, settling at the market's *current* consensus —
    /// a live oracle re-read, not the entry-time price.
    ///
    /// A position whose market has dropped out of the feed or lost all
    /// quotes cannot be marked, so the close is rejected and the position
    /// stays open.
    pub fn close_position(
        &mut self,
        position_id: &str,
        markets: &[Market],
    ) -> Result<Settlement, LedgerError> {
        let idx = self
            .positions
            .iter()
            .position(|p| p.id == position_id)
            .ok_or_else(|| LedgerError::PositionNotFound(position_id.to_string()))?;

        let (market_id, side) = {
            let p = &self.positions[idx];
            (p.market_id.clone(), p.side)
        };

        let consensus = markets
            .iter()
            .find(|m| m.id == market_id)
            .and_then(|m| m.quotes.consensus())
            .ok_or_else(|| LedgerError::InvalidMarket(market_id.clone()))?;

        let mark = implied_price(consensus, side);
        let position = self.positions.remove(idx);
        let payout = position.mark_value(mark);
        let profit = payout - position.amount_spent;
        self.balance += payout;

        info!(
            position_id = %position.id,
            market_id = %market_id,
            payout = %payout,
            profit = %profit,
            balance = %self.balance,
            "Position closed"
        );

        Ok(Settlement {
            position_id: position.id,
            payout,
            profit,
            closed_at: Utc::now(),
        })
    }

    /// Total portfolio value: cash plus every open position at its
    /// current mark. Recomputed on every call — the underlying consensus
    /// can move between calls, so this is never cached.
    pub fn portfolio_value(&self, markets: &[Market]) -> Decimal {
        self.balance
            + self
                .positions
                .iter()
                .map(|p| p.mark_value(self.mark_for(p, markets)))
                .sum::<Decimal>()
    }

    /// Open positions with their live marks attached.
    pub fn marked_positions(&self, markets: &[Market]) -> Vec<MarkedPosition> {
        self.positions
            .iter()
            .map(|p| {
                let mark_price = self.mark_for(p, markets);
                let mark_value = p.mark_value(mark_price);
                MarkedPosition {
                    position: p.clone(),
                    mark_price,
                    mark_value,
                    unrealized_pnl: mark_value - p.amount_spent,
                }
            })
            .collect()
    }

    /// Current mark for a position; falls back to the entry price when
    /// the market is missing or unquoted (stale-but-consistent valuation).
    fn mark_for(&self, position: &Position, markets: &[Market]) -> Decimal {
        markets
            .iter()
            .find(|m| m.id == position.market_id)
            .and_then(|m| m.quotes.consensus())
            .map(|c| implied_price(c, position.side))
            .unwrap_or(position.entry_price)
    }

    // -- Watchlist -------------------------------------------------------

    /// Toggle watchlist membership. Returns whether the market is now
    /// watched.
    pub fn toggle_watch(&mut self, market_id: &str) -> bool {
        if self.watchlist.remove(market_id) {
            debug!(market_id, "Removed from watchlist");
            false
        } else {
            self.watchlist.insert(market_id.to_string());
            debug!(market_id, "Added to watchlist");
            true
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
