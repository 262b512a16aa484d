//! Trading-session simulation.
//!
//! Replays a deterministic price path through the full
//! feed → engine → ledger pipeline and checks that the portfolio
//! accounting stays exact across refreshes, opens, and closes.

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use predicthub::engine;
    use predicthub::feed::catalog::CatalogFeed;
    use predicthub::feed::sim::{apply_ticks, ScriptedTicks, TickSource};
    use predicthub::feed::QuoteSource;
    use predicthub::ledger::Ledger;
    use predicthub::types::{Market, PlatformId, QuoteBoard, Side};

    fn two_quote_market(id: &str, a: Decimal, b: Decimal) -> Market {
        Market {
            id: id.to_string(),
            question: format!("Simulated event {id}?"),
            category: "Test".to_string(),
            quotes: QuoteBoard {
                polymarket: Some(a),
                kalshi: Some(b),
                ..Default::default()
            },
            volume: "$1.0M".to_string(),
            ends: "Dec 2026".to_string(),
            matched: true,
        }
    }

    /// A tick source that moves every quote by a fixed delta.
    struct UniformTicks(Decimal);

    impl TickSource for UniformTicks {
        fn next_delta(&mut self, _market_id: &str, _platform: PlatformId) -> Decimal {
            self.0
        }
    }

    #[tokio::test]
    async fn test_open_rally_close_accounting() {
        // Session: open YES at consensus 64, quotes rally +6 uniformly,
        // close at consensus 70. Every figure is exact under Decimal.
        let mut book = vec![two_quote_market("sim-1", dec!(64), dec!(64))];
        let mut ledger = Ledger::new(dec!(10000));

        let pos = ledger
            .open_position(&book[0], Side::Yes, dec!(100))
            .unwrap();
        assert_eq!(pos.shares, 156);
        assert_eq!(ledger.balance(), dec!(9900.16));

        apply_ticks(&mut book, &mut UniformTicks(dec!(6)));
        assert_eq!(book[0].quotes.consensus(), Some(dec!(70)));

        let settlement = ledger.close_position(&pos.id, &book).unwrap();
        assert_eq!(settlement.payout, dec!(109.20));
        assert_eq!(settlement.profit, dec!(9.36));
        assert_eq!(ledger.balance(), dec!(10009.36));
    }

    #[tokio::test]
    async fn test_portfolio_invariants_across_many_cycles() {
        // Drift the book through alternating up/down cycles while a mix
        // of positions stays open. Balance must never go negative and
        // portfolio value must always equal cash + marked positions.
        let mut book = vec![
            two_quote_market("sim-1", dec!(60), dec!(64)),
            two_quote_market("sim-2", dec!(30), dec!(34)),
            two_quote_market("sim-3", dec!(80), dec!(84)),
        ];
        let mut ledger = Ledger::new(dec!(1000));

        let p1 = ledger.open_position(&book[0], Side::Yes, dec!(200)).unwrap();
        let p2 = ledger.open_position(&book[1], Side::No, dec!(150)).unwrap();

        for cycle in 0..10 {
            let delta = if cycle % 2 == 0 { dec!(3) } else { dec!(-2) };
            apply_ticks(&mut book, &mut UniformTicks(delta));

            assert!(ledger.balance() >= Decimal::ZERO);
            let marked: Decimal = ledger
                .marked_positions(&book)
                .iter()
                .map(|m| m.mark_value)
                .sum();
            assert_eq!(ledger.portfolio_value(&book), ledger.balance() + marked);
        }

        // Net drift after 10 cycles: 5 × (+3) + 5 × (−2) = +5
        assert_eq!(book[0].quotes.consensus(), Some(dec!(67)));

        let s1 = ledger.close_position(&p1.id, &book).unwrap();
        let s2 = ledger.close_position(&p2.id, &book).unwrap();
        assert!(s1.profit > Decimal::ZERO); // YES gained on the rally
        assert!(s2.profit < Decimal::ZERO); // NO lost on the same rally
        assert!(ledger.positions().is_empty());
        assert_eq!(ledger.portfolio_value(&book), ledger.balance());
    }

    #[tokio::test]
    async fn test_feed_outage_does_not_corrupt_ledger() {
        // A refresh failure means trading continues against the
        // last-known snapshot; an open position in a vanished market is
        // still valued at entry.
        let book = vec![two_quote_market("sim-1", dec!(64), dec!(64))];
        let mut ledger = Ledger::new(dec!(10000));
        let pos = ledger.open_position(&book[0], Side::Yes, dec!(100)).unwrap();

        // Feed comes back empty — the market vanished this refresh
        let empty: Vec<Market> = Vec::new();
        assert_eq!(ledger.portfolio_value(&empty), dec!(10000));

        // Closing against the empty snapshot is rejected, state intact
        assert!(ledger.close_position(&pos.id, &empty).is_err());
        assert_eq!(ledger.positions().len(), 1);

        // The snapshot recovers and the close settles normally
        let settlement = ledger.close_position(&pos.id, &book).unwrap();
        assert_eq!(settlement.payout, pos.amount_spent);
    }

    #[tokio::test]
    async fn test_catalog_feed_drives_opportunity_surface() {
        // The built-in catalog through a scripted tick source yields a
        // deterministic opportunity ranking refresh over refresh.
        let feed = CatalogFeed::new(Box::new(ScriptedTicks::new([dec!(10)])));

        let first = feed.fetch_markets().await.unwrap();
        let ranked_first = engine::rank_by_threshold(&first, dec!(5));

        // Second fetch lifts m1's Polymarket quote 64 → 74, so the gap
        // widens from 68−61=7 to 74−61=13
        let second = feed.fetch_markets().await.unwrap();
        let ranked_second = engine::rank_by_threshold(&second, dec!(5));

        let gap_of = |markets: &[Market]| {
            markets
                .iter()
                .find(|m| m.id == "m1")
                .map(|m| m.quotes.arb_gap())
        };
        assert_eq!(gap_of(&ranked_first), Some(dec!(7)));
        assert_eq!(gap_of(&ranked_second), Some(dec!(13)));
        assert!(ranked_second
            .windows(2)
            .all(|w| w[0].quotes.arb_gap() >= w[1].quotes.arb_gap()));
    }
}
