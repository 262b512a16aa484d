//! Simulated price movement.
//!
//! The demo feed fakes liveness by nudging quotes between refreshes.
//! Deltas come from a `TickSource` so tests can inject deterministic
//! sequences instead of randomness; the default source derives its
//! deltas from a hash of (market, platform, step), which is stable
//! across runs.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;

use crate::types::{Market, PlatformId};

/// Supplies per-quote price deltas, in percent points.
pub trait TickSource: Send {
    fn next_delta(&mut self, market_id: &str, platform: PlatformId) -> Decimal;
}

/// Clamp a quote into the valid [0, 100] percentage band.
fn clamp_quote(q: Decimal) -> Decimal {
    q.max(dec!(0)).min(dec!(100))
}

/// Apply one round of ticks to every present quote on every market.
pub fn apply_ticks(markets: &mut [Market], ticks: &mut dyn TickSource) {
    for market in markets.iter_mut() {
        for &platform in PlatformId::ALL {
            if let Some(q) = market.quotes.get(platform) {
                let delta = ticks.next_delta(&market.id, platform);
                market.quotes.set(platform, Some(clamp_quote(q + delta)));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// FNV-1a over a byte slice, folded into a running seed.
fn mix(mut seed: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        seed ^= b as u64;
        seed = seed.wrapping_mul(0x0100_0000_01b3);
    }
    seed
}

/// Deterministic offset in `{-magnitude, +magnitude}` for a market/platform
/// pair. Used to derive plausible sibling-platform quotes from a single
/// real quote.
pub fn sibling_offset(market_id: &str, platform: PlatformId, magnitude: Decimal) -> Decimal {
    let mut seed = mix(0xcbf2_9ce4_8422_2325, market_id.as_bytes());
    seed = mix(seed, format!("{platform}").as_bytes());
    if seed % 2 == 0 {
        magnitude
    } else {
        -magnitude
    }
}

// ---------------------------------------------------------------------------
// Tick sources
// ---------------------------------------------------------------------------

/// Default tick source: hash-derived drift in [-2, +2] percent points.
#[derive(Debug, Default)]
pub struct DriftTicks {
    step: u64,
}

impl DriftTicks {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TickSource for DriftTicks {
    fn next_delta(&mut self, market_id: &str, platform: PlatformId) -> Decimal {
        self.step += 1;
        let mut seed = mix(0x8422_2325_cbf2_9ce4, market_id.as_bytes());
        seed = mix(seed, format!("{platform}").as_bytes());
        seed = mix(seed, &self.step.to_le_bytes());
        Decimal::from((seed % 5) as i64 - 2)
    }
}

/// Scripted tick source for tests: pops deltas in order, then zeroes.
#[derive(Debug, Default)]
pub struct ScriptedTicks {
    deltas: VecDeque<Decimal>,
}

impl ScriptedTicks {
    pub fn new(deltas: impl IntoIterator<Item = Decimal>) -> Self {
        Self {
            deltas: deltas.into_iter().collect(),
        }
    }
}

impl TickSource for ScriptedTicks {
    fn next_delta(&mut self, _market_id: &str, _platform: PlatformId) -> Decimal {
        self.deltas.pop_front().unwrap_or(Decimal::ZERO)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
