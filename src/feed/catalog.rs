//! Built-in demo market catalog.
//!
//! A fixed set of cross-platform events used when no live feed is
//! configured, and as the fallback data set in tests. The `CatalogFeed`
//! wraps the catalog with a tick source so quotes drift between
//! refreshes like a live board.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Mutex;

use super::sim::{apply_ticks, TickSource};
use super::QuoteSource;
use crate::types::{Market, QuoteBoard};

const SOURCE_NAME: &str = "catalog";

fn market(
    id: &str,
    question: &str,
    category: &str,
    quotes: QuoteBoard,
    volume: &str,
    ends: &str,
    matched: bool,
) -> Market {
    Market {
        id: id.to_string(),
        question: question.to_string(),
        category: category.to_string(),
        quotes,
        volume: volume.to_string(),
        ends: ends.to_string(),
        matched,
    }
}

fn quotes(
    polymarket: Option<Decimal>,
    kalshi: Option<Decimal>,
    predictit: Option<Decimal>,
    manifold: Option<Decimal>,
    smarkets: Option<Decimal>,
    betfair: Option<Decimal>,
) -> QuoteBoard {
    QuoteBoard {
        polymarket,
        kalshi,
        predictit,
        manifold,
        smarkets,
        betfair,
    }
}

/// The seed market list served before any price ticks are applied.
pub fn catalog() -> Vec<Market> {
    vec![
        market(
            "m1", "Fed Interest Rate cut in March 2026?", "Economics",
            quotes(Some(dec!(64)), Some(dec!(61)), Some(dec!(68)), None, None, None),
            "$14.2M", "Mar 2026", true,
        ),
        market(
            "m2", "OpenAI launches GPT-5 before July 2026?", "Tech",
            quotes(Some(dec!(72)), Some(dec!(68)), None, Some(dec!(75)), None, None),
            "$2.8M", "Jun 2026", true,
        ),
        market(
            "m3", "SpaceX Starship reaches orbit on next test flight?", "Science",
            quotes(Some(dec!(79)), Some(dec!(77)), Some(dec!(75)), None, None, None),
            "$1.1M", "Apr 2026", true,
        ),
        market(
            "m4", "Winner of 2026 French Presidential Election?", "Politics",
            quotes(Some(dec!(42)), None, Some(dec!(45)), Some(dec!(40)), None, None),
            "$8.4M", "May 2026", true,
        ),
        market(
            "m5", "Bitcoin price exceeds $150,000 by Dec 2026?", "Crypto",
            quotes(Some(dec!(55)), Some(dec!(52)), None, Some(dec!(58)), None, None),
            "$22.1M", "Dec 2026", true,
        ),
        market(
            "m6", "Will the US enter a recession in 2026?", "Economics",
            quotes(Some(dec!(31)), Some(dec!(34)), Some(dec!(42)), None, None, None),
            "$12.8M", "Dec 2026", true,
        ),
        market(
            "m7", "Apple announces Vision Pro 2 in 2026?", "Tech",
            quotes(Some(dec!(45)), None, None, Some(dec!(48)), None, None),
            "$900k", "Oct 2026", false,
        ),
        market(
            "m8", "Who will win the 2026 World Cup?", "Sports",
            quotes(None, None, None, Some(dec!(12)), Some(dec!(14)), Some(dec!(15))),
            "$45.0M", "Jul 2026", false,
        ),
        market(
            "m9", "Kamala Harris approval rating above 45% in 2026?", "Politics",
            quotes(None, Some(dec!(35)), Some(dec!(38)), None, None, None),
            "$2.1M", "Dec 2026", false,
        ),
        market(
            "m10", "Meta releases fully AR glasses in 2026?", "Tech",
            quotes(Some(dec!(22)), None, None, Some(dec!(28)), None, None),
            "$4.5M", "Nov 2026", false,
        ),
        market(
            "m11", "Oil price per barrel below $60 by Aug 2026?", "Economics",
            quotes(Some(dec!(15)), Some(dec!(18)), None, None, None, None),
            "$6.2M", "Aug 2026", false,
        ),
        market(
            "m12", "TikTok remains legal in the US by July 2026?", "Legal",
            quotes(Some(dec!(48)), Some(dec!(52)), Some(dec!(50)), None, None, None),
            "$9.2M", "Jul 2026", true,
        ),
        market(
            "m13", "Ethereum ETF volume exceeds Bitcoin ETF in 2026?", "Crypto",
            quotes(Some(dec!(25)), None, None, Some(dec!(30)), None, None),
            "$1.4M", "Dec 2026", false,
        ),
        market(
            "m14", "NASA finds evidence of past life on Mars in 2026?", "Science",
            quotes(Some(dec!(8)), None, None, Some(dec!(12)), None, None),
            "$500k", "Dec 2026", false,
        ),
        market(
            "m15", "UK rejoins the Single Market by 2030?", "Politics",
            quotes(None, None, None, Some(dec!(32)), Some(dec!(28)), None),
            "$3.8M", "Dec 2029", false,
        ),
        market(
            "m16", "Global average temp rise exceeds 1.5C in 2026?", "Science",
            quotes(Some(dec!(85)), Some(dec!(88)), None, Some(dec!(90)), None, None),
            "$2.2M", "Dec 2026", false,
        ),
        market(
            "m17", "Tesla Robotaxi operating in 3+ cities in 2026?", "Tech",
            quotes(Some(dec!(15)), Some(dec!(12)), None, Some(dec!(22)), None, None),
            "$11.5M", "Dec 2026", false,
        ),
        market(
            "m18", "Universal Basic Income trial in a major US city?", "Politics",
            quotes(None, None, Some(dec!(40)), Some(dec!(45)), None, None),
            "$1.1M", "Dec 2026", false,
        ),
        market(
            "m19", "New COVID-26 variant leads to lockdowns?", "Health",
            quotes(Some(dec!(5)), None, None, Some(dec!(8)), None, None),
            "$4.1M", "Dec 2026", false,
        ),
        market(
            "m20", "Nuclear Fusion net energy gain in a commercial reactor?", "Science",
            quotes(Some(dec!(10)), None, None, Some(dec!(15)), None, None),
            "$1.8M", "Dec 2026", false,
        ),
    ]
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// Demo quote source: serves the catalog, drifting quotes through the
/// injected tick source on every refresh after the first.
pub struct CatalogFeed {
    book: Mutex<Vec<Market>>,
    ticks: Mutex<Box<dyn TickSource>>,
    primed: Mutex<bool>,
}

impl CatalogFeed {
    pub fn new(ticks: Box<dyn TickSource>) -> Self {
        Self {
            book: Mutex::new(catalog()),
            ticks: Mutex::new(ticks),
            primed: Mutex::new(false),
        }
    }
}

#[async_trait]
impl QuoteSource for CatalogFeed {
    async fn fetch_markets(&self) -> Result<Vec<Market>> {
        let mut primed = self
            .primed
            .lock()
            .map_err(|_| anyhow::anyhow!("catalog feed lock poisoned"))?;
        let mut book = self
            .book
            .lock()
            .map_err(|_| anyhow::anyhow!("catalog feed lock poisoned"))?;

        if *primed {
            let mut ticks = self
                .ticks
                .lock()
                .map_err(|_| anyhow::anyhow!("catalog feed lock poisoned"))?;
            apply_ticks(&mut book, ticks.as_mut());
        }
        *primed = true;

        Ok(book.clone())
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
