#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    use crate::config::EngineConfig;
    use crate::errors::{DatabaseError, Error, Result};
    use crate::events::{DomainEvent, MockDomainEventSink};
    use crate::holdings::{
        AssetClass, HoldingRef, HoldingService, HoldingServiceTrait, NewHolding, PricingMode,
    };
    use crate::storage::{HoldingLocks, InMemoryLedgerStore, LedgerStoreTrait, LedgerWriteBatch};
    use crate::transactions::{
        NewTransaction, TradeRequest, TransactionService, TransactionServiceTrait, TransactionType,
    };
    use crate::wallets::WalletBalanceTrait;

    struct UnlimitedWallet;

    #[async_trait]
    impl WalletBalanceTrait for UnlimitedWallet {
        async fn adjust_balance(&self, _wallet_id: &str, delta: i64) -> Result<i64> {
            Ok(delta)
        }
    }

    struct Fixture {
        holdings: HoldingService,
        transactions: TransactionService,
        store: Arc<InMemoryLedgerStore>,
        events: MockDomainEventSink,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryLedgerStore::new());
        let locks = Arc::new(HoldingLocks::new());
        let events = MockDomainEventSink::new();
        Fixture {
            holdings: HoldingService::new(
                store.clone(),
                locks.clone(),
                Arc::new(events.clone()),
                EngineConfig::default(),
            ),
            transactions: TransactionService::new(
                store.clone(),
                Arc::new(UnlimitedWallet),
                locks,
                Arc::new(events.clone()),
                EngineConfig::default(),
            ),
            store,
            events,
        }
    }

    fn new_holding(wallet_id: &str, symbol: &str, pricing_mode: PricingMode) -> NewHolding {
        NewHolding {
            wallet_id: wallet_id.to_string(),
            symbol: symbol.to_string(),
            name: None,
            currency: "USD".to_string(),
            asset_class: AssetClass::Stock,
            pricing_mode,
        }
    }

    async fn trade(f: &Fixture, holding_id: &str, kind: TransactionType, qty: i64, price: i64) {
        f.transactions
            .add_transaction(NewTransaction {
                holding: HoldingRef::Id {
                    holding_id: holding_id.to_string(),
                },
                trade: TradeRequest {
                    transaction_type: kind,
                    quantity: qty * 10_000,
                    price,
                    fees: 0,
                    transaction_date: Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap(),
                    notes: None,
                },
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_holding_is_unique_per_wallet_and_symbol() {
        let f = fixture();

        let created = f
            .holdings
            .create_holding(new_holding("W1", "vti", PricingMode::Market))
            .await
            .unwrap();
        assert_eq!(created.symbol, "VTI");
        assert_eq!(created.version, 1);
        assert_eq!(
            f.events.events(),
            vec![DomainEvent::HoldingCreated {
                holding_id: created.id.clone(),
                wallet_id: "W1".to_string(),
                symbol: "VTI".to_string(),
            }]
        );

        let duplicate = f
            .holdings
            .create_holding(new_holding("W1", "VTI", PricingMode::Market))
            .await;
        assert!(matches!(
            duplicate,
            Err(Error::Database(DatabaseError::UniqueViolation(_)))
        ));

        // Same symbol in another wallet is a different holding.
        f.holdings
            .create_holding(new_holding("W2", "VTI", PricingMode::Market))
            .await
            .unwrap();
        assert_eq!(f.holdings.list_holdings(None).unwrap().len(), 2);
        assert_eq!(f.holdings.list_holdings(Some("W2")).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_holding_requires_symbol() {
        let f = fixture();
        let result = f
            .holdings
            .create_holding(new_holding("W1", "  ", PricingMode::Market))
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_manual_price_of_zero_is_accepted() {
        let f = fixture();
        let holding = f
            .holdings
            .create_holding(new_holding("W1", "ART-1", PricingMode::Manual))
            .await
            .unwrap();
        trade(&f, &holding.id, TransactionType::Buy, 1, 500_000).await;

        let priced = f.holdings.set_manual_price(&holding.id, 0).await.unwrap();

        assert_eq!(priced.current_price, Some(0));
        assert_eq!(priced.current_value, 0);
        assert_eq!(priced.unrealized_pnl, -500_000);
        assert_eq!(priced.unrealized_pnl_percent, dec!(-100));
        assert!(priced.price_updated_at.is_some());
        assert_eq!(
            f.events.events().last(),
            Some(&DomainEvent::valuations_changed(vec![holding.id.clone()]))
        );
    }

    #[tokio::test]
    async fn test_manual_price_rejects_market_holdings_and_negative_prices() {
        let f = fixture();
        let market = f
            .holdings
            .create_holding(new_holding("W1", "AAPL", PricingMode::Market))
            .await
            .unwrap();
        let manual = f
            .holdings
            .create_holding(new_holding("W1", "HOUSE", PricingMode::Manual))
            .await
            .unwrap();

        let on_market = f.holdings.set_manual_price(&market.id, 100).await;
        assert!(matches!(on_market, Err(Error::Validation(_))));

        let negative = f.holdings.set_manual_price(&manual.id, -1).await;
        assert!(matches!(negative, Err(Error::Validation(_))));

        let missing = f.holdings.set_manual_price("nope", 1).await;
        assert!(matches!(missing, Err(ref e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_get_lots_filters_closed_lots() {
        let f = fixture();
        let holding = f
            .holdings
            .create_holding(new_holding("W1", "AAPL", PricingMode::Market))
            .await
            .unwrap();
        trade(&f, &holding.id, TransactionType::Buy, 10, 1_000).await;
        trade(&f, &holding.id, TransactionType::Buy, 10, 1_100).await;
        trade(&f, &holding.id, TransactionType::Sell, 10, 1_200).await;

        assert_eq!(f.holdings.get_lots(&holding.id, false).unwrap().len(), 2);
        let open = f.holdings.get_lots(&holding.id, true).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].average_cost, 1_100);

        let missing = f.holdings.get_lots("nope", true);
        assert!(matches!(missing, Err(ref e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_portfolio_summary_sums_one_wallet() {
        let f = fixture();
        let a = f
            .holdings
            .create_holding(new_holding("W1", "A", PricingMode::Manual))
            .await
            .unwrap();
        let b = f
            .holdings
            .create_holding(new_holding("W1", "B", PricingMode::Manual))
            .await
            .unwrap();
        let other = f
            .holdings
            .create_holding(new_holding("W2", "A", PricingMode::Manual))
            .await
            .unwrap();
        trade(&f, &a.id, TransactionType::Buy, 10, 1_000).await;
        trade(&f, &b.id, TransactionType::Buy, 10, 2_000).await;
        trade(&f, &b.id, TransactionType::Sell, 5, 2_500).await;
        trade(&f, &other.id, TransactionType::Buy, 1, 99_999).await;
        f.holdings.set_manual_price(&a.id, 1_500).await.unwrap();
        f.holdings.set_manual_price(&b.id, 2_500).await.unwrap();

        let summary = f.holdings.get_portfolio_summary("W1").unwrap();

        assert_eq!(summary.holding_count, 2);
        assert_eq!(summary.total_value, 15_000 + 12_500);
        assert_eq!(summary.total_cost, 10_000 + 20_000);
        assert_eq!(summary.unrealized_pnl, 5_000 - 7_500);
        assert_eq!(summary.unrealized_pnl_percent, dec!(-8.33));
        assert_eq!(summary.realized_pnl, 2_500);
    }

    #[tokio::test]
    async fn test_portfolio_summary_of_empty_wallet() {
        let f = fixture();
        let summary = f.holdings.get_portfolio_summary("EMPTY").unwrap();
        assert_eq!(summary.holding_count, 0);
        assert_eq!(summary.unrealized_pnl_percent, dec!(0));
    }

    #[tokio::test]
    async fn test_verify_holding_reports_drift() {
        let f = fixture();
        let holding = f
            .holdings
            .create_holding(new_holding("W1", "AAPL", PricingMode::Market))
            .await
            .unwrap();
        trade(&f, &holding.id, TransactionType::Buy, 10, 1_000).await;
        trade(&f, &holding.id, TransactionType::Sell, 4, 1_500).await;

        assert!(f.holdings.verify_holding(&holding.id).unwrap().is_consistent());

        let mut tampered = f.store.get_holding(&holding.id).unwrap();
        let version = tampered.version;
        tampered.quantity += 1;
        f.store
            .commit(LedgerWriteBatch::new(tampered, Some(version)))
            .await
            .unwrap();

        let report = f.holdings.verify_holding(&holding.id).unwrap();
        assert!(!report.is_consistent());
        assert_eq!(report.drift.len(), 1);
        assert!(report.drift[0].starts_with("quantity"));
    }
}
