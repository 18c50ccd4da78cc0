use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use futures::stream::{self, StreamExt};
use log::{debug, warn};

use super::valuation_model::{StaleValuation, ValuationRefreshReport};
use crate::config::EngineConfig;
use crate::constants::CURRENCY_MINOR_UNITS;
use crate::errors::{Error, Result};
use crate::events::{DomainEvent, DomainEventSink};
use crate::holdings::{commit_price, Holding};
use crate::storage::{HoldingLocks, LedgerStoreTrait};
use crate::utils::scaled_math::to_minor_units;
use holdfolio_market_data::{MarketDataError, PriceProvider, PriceRequest, Quote};

#[async_trait]
pub trait ValuationServiceTrait: Send + Sync {
    /// Fetches fresh prices for `holding_ids` and commits the new
    /// valuations. A failing holding keeps its last price and is reported
    /// in `stale`; the rest of the batch carries on.
    async fn refresh_valuation(
        &self,
        holding_ids: &[String],
        force_refresh: bool,
    ) -> Result<ValuationRefreshReport>;
}

pub struct ValuationService {
    store: Arc<dyn LedgerStoreTrait>,
    locks: Arc<HoldingLocks>,
    price_provider: Arc<dyn PriceProvider>,
    event_sink: Arc<dyn DomainEventSink>,
    config: EngineConfig,
}

impl ValuationService {
    pub fn new(
        store: Arc<dyn LedgerStoreTrait>,
        locks: Arc<HoldingLocks>,
        price_provider: Arc<dyn PriceProvider>,
        event_sink: Arc<dyn DomainEventSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            locks,
            price_provider,
            event_sink,
            config,
        }
    }

    fn price_request(&self, holding: &Holding, force_refresh: bool) -> PriceRequest {
        if force_refresh {
            PriceRequest::forced(&holding.symbol, &holding.currency)
        } else {
            PriceRequest::new(&holding.symbol, &holding.currency, self.config.price_max_age())
        }
    }

    /// Fetches, checks and commits the price of one holding.
    async fn refresh_one(&self, holding: &Holding, force_refresh: bool) -> Result<i64> {
        let request = self.price_request(holding, force_refresh);
        let fetch = self.price_provider.fetch_price(&request);

        // A timed-out fetch is dropped before anything is written.
        let quote = match tokio::time::timeout(self.config.fetch_timeout(), fetch).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(MarketDataError::Timeout {
                    provider: self.price_provider.id().to_string(),
                }
                .into())
            }
        };
        check_quote(holding, &request, &quote)?;

        let price = to_minor_units(quote.price, CURRENCY_MINOR_UNITS)?;
        commit_price(
            self.store.as_ref(),
            &self.locks,
            &holding.id,
            price,
            quote.timestamp,
            self.config.max_commit_attempts,
        )
        .await?;
        debug!(
            "Priced {} ({}) at {} from {}",
            holding.id, holding.symbol, price, quote.source
        );
        Ok(price)
    }
}

/// Rejects quotes that cannot be applied to `holding`.
fn check_quote(
    holding: &Holding,
    request: &PriceRequest,
    quote: &Quote,
) -> std::result::Result<(), MarketDataError> {
    if !quote.currency.eq_ignore_ascii_case(&holding.currency) {
        return Err(MarketDataError::UnsupportedCurrency {
            symbol: holding.symbol.clone(),
            currency: holding.currency.clone(),
        });
    }
    if quote.price.is_sign_negative() {
        return Err(MarketDataError::ValidationFailed {
            message: format!("negative price {} for {}", quote.price, holding.symbol),
        });
    }
    let now = Utc::now();
    if request.max_age > Duration::zero() && !quote.is_fresh(request.max_age, now) {
        return Err(MarketDataError::StaleQuote {
            symbol: holding.symbol.clone(),
            age_secs: quote.age(now).num_seconds(),
        });
    }
    Ok(())
}

fn is_transient(err: &Error) -> bool {
    match err {
        Error::MarketData(market_err) => market_err.retry_class().is_transient(),
        other => other.is_write_race(),
    }
}

#[async_trait]
impl ValuationServiceTrait for ValuationService {
    async fn refresh_valuation(
        &self,
        holding_ids: &[String],
        force_refresh: bool,
    ) -> Result<ValuationRefreshReport> {
        let mut report = ValuationRefreshReport::default();
        let mut seen = HashSet::new();
        let mut targets = Vec::new();

        for holding_id in holding_ids {
            if !seen.insert(holding_id.as_str()) {
                continue;
            }
            match self.store.get_holding(holding_id) {
                Ok(holding) if holding.is_manual() => {
                    debug!("Skipping manually priced holding {}", holding.id);
                    report.skipped.push(holding.id);
                }
                Ok(holding) => targets.push(holding),
                Err(err) if err.is_not_found() => {
                    warn!("Cannot refresh unknown holding {}", holding_id);
                    report.stale.insert(
                        holding_id.clone(),
                        StaleValuation {
                            last_known_price: None,
                            reason: err.to_string(),
                            transient: false,
                        },
                    );
                }
                Err(err) => return Err(err),
            }
        }

        debug!(
            "Refreshing {} holdings ({} in flight max, force={})",
            targets.len(),
            self.config.refresh_concurrency,
            force_refresh
        );

        let results: Vec<(Holding, Result<i64>)> = stream::iter(targets)
            .map(|holding| async move {
                let result = self.refresh_one(&holding, force_refresh).await;
                (holding, result)
            })
            .buffer_unordered(self.config.refresh_concurrency.max(1))
            .collect()
            .await;

        for (holding, result) in results {
            match result {
                Ok(price) => {
                    report.prices.insert(holding.id.clone(), price);
                }
                Err(err) => {
                    warn!(
                        "Failed to refresh price of {} ({}): {}. Keeping last known price {:?}.",
                        holding.id, holding.symbol, err, holding.current_price
                    );
                    report.stale.insert(
                        holding.id.clone(),
                        StaleValuation {
                            last_known_price: holding.current_price,
                            transient: is_transient(&err),
                            reason: err.to_string(),
                        },
                    );
                }
            }
        }

        if !report.prices.is_empty() {
            let mut updated: Vec<String> = report.prices.keys().cloned().collect();
            updated.sort();
            self.event_sink
                .emit(DomainEvent::valuations_changed(updated));
        }
        if !report.stale.is_empty() {
            warn!(
                "Valuation refresh left {} of {} holdings stale",
                report.stale.len(),
                seen.len()
            );
        }

        Ok(report)
    }
}
