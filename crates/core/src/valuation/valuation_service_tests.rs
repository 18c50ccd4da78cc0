#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::config::EngineConfig;
    use crate::errors::Result;
    use crate::events::{DomainEvent, MockDomainEventSink};
    use crate::holdings::{
        AssetClass, Holding, HoldingRef, HoldingService, HoldingServiceTrait, NewHolding,
        PricingMode,
    };
    use crate::storage::{HoldingLocks, InMemoryLedgerStore, LedgerStoreTrait};
    use crate::transactions::{
        NewTransaction, TradeRequest, TransactionService, TransactionServiceTrait, TransactionType,
    };
    use crate::valuation::{ValuationService, ValuationServiceTrait};
    use crate::wallets::WalletBalanceTrait;
    use holdfolio_market_data::{MarketDataError, PriceProvider, PriceRequest, Quote};

    // ============================================================================
    // Mock price provider
    // ============================================================================

    #[derive(Clone)]
    enum Behavior {
        Price(Decimal),
        PriceIn(Decimal, &'static str),
        Aged(Decimal, i64),
        NotFound,
        RateLimited,
        Hang,
    }

    #[derive(Default)]
    struct MockPriceProvider {
        behaviors: Mutex<HashMap<String, Behavior>>,
        requests: Mutex<Vec<PriceRequest>>,
    }

    impl MockPriceProvider {
        fn set(&self, symbol: &str, behavior: Behavior) {
            self.behaviors
                .lock()
                .unwrap()
                .insert(symbol.to_string(), behavior);
        }

        fn requests(&self) -> Vec<PriceRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PriceProvider for MockPriceProvider {
        fn id(&self) -> &'static str {
            "MOCK"
        }

        async fn fetch_price(&self, request: &PriceRequest) -> std::result::Result<Quote, MarketDataError> {
            self.requests.lock().unwrap().push(request.clone());
            let behavior = self
                .behaviors
                .lock()
                .unwrap()
                .get(&request.symbol)
                .cloned()
                .unwrap_or(Behavior::NotFound);
            let quote = |price, currency: &str, at| {
                Quote::new(request.symbol.clone(), at, price, currency, "MOCK")
            };
            match behavior {
                Behavior::Price(price) => Ok(quote(price, &request.currency, Utc::now())),
                Behavior::PriceIn(price, currency) => Ok(quote(price, currency, Utc::now())),
                Behavior::Aged(price, secs) => Ok(quote(
                    price,
                    &request.currency,
                    Utc::now() - Duration::seconds(secs),
                )),
                Behavior::NotFound => Err(MarketDataError::SymbolNotFound(request.symbol.clone())),
                Behavior::RateLimited => Err(MarketDataError::RateLimited {
                    provider: "MOCK".to_string(),
                }),
                Behavior::Hang => {
                    tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                    Err(MarketDataError::NoProvidersAvailable)
                }
            }
        }
    }

    struct UnlimitedWallet;

    #[async_trait]
    impl WalletBalanceTrait for UnlimitedWallet {
        async fn adjust_balance(&self, _wallet_id: &str, delta: i64) -> Result<i64> {
            Ok(delta)
        }
    }

    // ============================================================================
    // Helpers
    // ============================================================================

    struct Fixture {
        valuation: ValuationService,
        holdings: HoldingService,
        transactions: TransactionService,
        store: Arc<InMemoryLedgerStore>,
        provider: Arc<MockPriceProvider>,
        events: MockDomainEventSink,
    }

    fn fixture() -> Fixture {
        let config = EngineConfig {
            fetch_timeout_ms: 100,
            ..EngineConfig::default()
        };
        let store = Arc::new(InMemoryLedgerStore::new());
        let locks = Arc::new(HoldingLocks::new());
        let provider = Arc::new(MockPriceProvider::default());
        let events = MockDomainEventSink::new();
        Fixture {
            valuation: ValuationService::new(
                store.clone(),
                locks.clone(),
                provider.clone(),
                Arc::new(events.clone()),
                config.clone(),
            ),
            holdings: HoldingService::new(
                store.clone(),
                locks.clone(),
                Arc::new(events.clone()),
                config.clone(),
            ),
            transactions: TransactionService::new(
                store.clone(),
                Arc::new(UnlimitedWallet),
                locks,
                Arc::new(events.clone()),
                config,
            ),
            store,
            provider,
            events,
        }
    }

    async fn holding(f: &Fixture, symbol: &str, pricing_mode: PricingMode) -> Holding {
        f.holdings
            .create_holding(NewHolding {
                wallet_id: "W1".to_string(),
                symbol: symbol.to_string(),
                name: None,
                currency: "USD".to_string(),
                asset_class: AssetClass::Stock,
                pricing_mode,
            })
            .await
            .unwrap()
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
                    transaction_date: Utc.with_ymd_and_hms(2024, 6, 3, 16, 0, 0).unwrap(),
                    notes: None,
                },
            })
            .await
            .unwrap();
    }

    // ============================================================================
    // Tests
    // ============================================================================

    #[tokio::test]
    async fn test_failing_symbol_does_not_abort_batch() {
        let f = fixture();
        let good = holding(&f, "AAPL", PricingMode::Market).await;
        let bad = holding(&f, "DELISTED", PricingMode::Market).await;
        trade(&f, &good.id, TransactionType::Buy, 10, 15_000).await;
        f.provider.set("AAPL", Behavior::Price(dec!(170.25)));
        f.provider.set("DELISTED", Behavior::NotFound);
        f.events.take();

        let report = f
            .valuation
            .refresh_valuation(&[good.id.clone(), bad.id.clone()], false)
            .await
            .unwrap();

        assert_eq!(report.prices, HashMap::from([(good.id.clone(), 17_025)]));
        let stale = &report.stale[&bad.id];
        assert_eq!(stale.last_known_price, None);
        assert!(!stale.transient);
        assert!(stale.reason.contains("DELISTED"));
        assert!(!report.is_complete());

        let priced = f.store.get_holding(&good.id).unwrap();
        assert_eq!(priced.current_price, Some(17_025));
        assert_eq!(priced.current_value, 170_250);
        assert_eq!(priced.unrealized_pnl, 20_250);
        assert_eq!(priced.unrealized_pnl_percent, dec!(13.5));
        assert_eq!(
            f.events.events(),
            vec![DomainEvent::valuations_changed(vec![good.id.clone()])]
        );
    }

    #[tokio::test]
    async fn test_timeout_keeps_previous_valuation() {
        let f = fixture();
        let h = holding(&f, "SLOW", PricingMode::Market).await;
        trade(&f, &h.id, TransactionType::Buy, 1, 10_000).await;
        f.provider.set("SLOW", Behavior::Price(dec!(101)));
        f.valuation
            .refresh_valuation(&[h.id.clone()], false)
            .await
            .unwrap();
        let before = f.store.get_holding(&h.id).unwrap();
        f.events.take();

        f.provider.set("SLOW", Behavior::Hang);
        let report = f
            .valuation
            .refresh_valuation(&[h.id.clone()], true)
            .await
            .unwrap();

        assert!(report.prices.is_empty());
        let stale = &report.stale[&h.id];
        assert_eq!(stale.last_known_price, Some(10_100));
        assert!(stale.transient);
        assert_eq!(f.store.get_holding(&h.id).unwrap(), before);
        assert!(f.events.is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient() {
        let f = fixture();
        let h = holding(&f, "BUSY", PricingMode::Market).await;
        f.provider.set("BUSY", Behavior::RateLimited);

        let report = f.valuation.refresh_valuation(&[h.id.clone()], false).await.unwrap();

        assert!(report.stale[&h.id].transient);
    }

    #[tokio::test]
    async fn test_manual_holdings_are_skipped() {
        let f = fixture();
        let manual = holding(&f, "PAINTING", PricingMode::Manual).await;
        f.holdings.set_manual_price(&manual.id, 1_000_000).await.unwrap();

        let report = f
            .valuation
            .refresh_valuation(&[manual.id.clone()], true)
            .await
            .unwrap();

        assert_eq!(report.skipped, vec![manual.id.clone()]);
        assert!(report.prices.is_empty());
        assert!(f.provider.requests().is_empty());
        assert_eq!(
            f.store.get_holding(&manual.id).unwrap().current_price,
            Some(1_000_000)
        );
    }

    #[tokio::test]
    async fn test_unrealized_pnl_is_measured_against_full_historical_cost() {
        let f = fixture();
        let h = holding(&f, "MIXED", PricingMode::Market).await;
        trade(&f, &h.id, TransactionType::Buy, 10, 1_000).await;
        trade(&f, &h.id, TransactionType::Buy, 10, 2_000).await;
        trade(&f, &h.id, TransactionType::Sell, 10, 1_500).await;
        f.provider.set("MIXED", Behavior::Price(dec!(20)));

        f.valuation.refresh_valuation(&[h.id.clone()], false).await.unwrap();

        let priced = f.store.get_holding(&h.id).unwrap();
        assert_eq!(priced.quantity, 100_000);
        assert_eq!(priced.current_value, 20_000);
        // Open lots cost 20_000, but the whole 30_000 ever spent is the baseline.
        assert_eq!(priced.total_cost, 30_000);
        assert_eq!(priced.unrealized_pnl, -10_000);
        assert_eq!(priced.unrealized_pnl_percent, dec!(-33.33));
    }

    #[tokio::test]
    async fn test_zero_market_price_is_accepted() {
        let f = fixture();
        let h = holding(&f, "BUST", PricingMode::Market).await;
        trade(&f, &h.id, TransactionType::Buy, 5, 1_000).await;
        f.provider.set("BUST", Behavior::Price(Decimal::ZERO));

        let report = f.valuation.refresh_valuation(&[h.id.clone()], false).await.unwrap();

        assert_eq!(report.prices[&h.id], 0);
        let priced = f.store.get_holding(&h.id).unwrap();
        assert_eq!(priced.current_value, 0);
        assert_eq!(priced.unrealized_pnl, -5_000);
    }

    #[tokio::test]
    async fn test_quote_in_wrong_currency_is_rejected() {
        let f = fixture();
        let h = holding(&f, "SAP", PricingMode::Market).await;
        f.provider.set("SAP", Behavior::PriceIn(dec!(120), "EUR"));

        let report = f.valuation.refresh_valuation(&[h.id.clone()], false).await.unwrap();

        assert!(report.prices.is_empty());
        assert!(!report.stale[&h.id].transient);
        assert_eq!(f.store.get_holding(&h.id).unwrap().current_price, None);
    }

    #[tokio::test]
    async fn test_staleness_budget_and_forced_refresh() {
        let f = fixture();
        let h = holding(&f, "OLD", PricingMode::Market).await;
        f.provider.set("OLD", Behavior::Aged(dec!(50), 7_200));

        let report = f.valuation.refresh_valuation(&[h.id.clone()], false).await.unwrap();
        assert!(report.stale[&h.id].reason.contains("stale"));

        let report = f.valuation.refresh_valuation(&[h.id.clone()], true).await.unwrap();
        assert_eq!(report.prices[&h.id], 5_000);

        let requests = f.provider.requests();
        assert_eq!(requests[0].max_age, Duration::seconds(900));
        assert_eq!(requests[1].max_age, Duration::zero());
    }

    #[tokio::test]
    async fn test_unknown_and_duplicate_ids() {
        let f = fixture();
        let h = holding(&f, "AAPL", PricingMode::Market).await;
        f.provider.set("AAPL", Behavior::Price(dec!(1)));

        let report = f
            .valuation
            .refresh_valuation(&[h.id.clone(), h.id.clone(), "ghost".to_string()], false)
            .await
            .unwrap();

        assert_eq!(f.provider.requests().len(), 1);
        assert_eq!(report.prices.len(), 1);
        assert_eq!(report.stale["ghost"].last_known_price, None);
    }
}
