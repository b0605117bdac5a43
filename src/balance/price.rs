use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DurationRound, TimeDelta};
use itertools::Itertools;
use log::{debug, trace};

use crate::api::{BrokerApi, Candle, CandleInterval};
use crate::core::GenericResult;
use crate::time::{TimeProvider, UtcDateTime};
use crate::types::Decimal;

struct PriceWindow {
    interval: CandleInterval,
    lookback: TimeDelta,
    truncate_to: TimeDelta,
}

// Illiquid instruments may have no trades in a short window, so we widen it step by step
fn price_windows() -> [PriceWindow; 3] {
    [
        PriceWindow {interval: CandleInterval::Minute, lookback: TimeDelta::minutes(60), truncate_to: TimeDelta::minutes(1)},
        PriceWindow {interval: CandleInterval::Hour,   lookback: TimeDelta::hours(24),   truncate_to: TimeDelta::hours(1)},
        PriceWindow {interval: CandleInterval::Day,    lookback: TimeDelta::days(7),     truncate_to: TimeDelta::hours(1)},
    ]
}

pub struct PriceResolver {
    api: Arc<dyn BrokerApi>,
    time_provider: Box<dyn TimeProvider>,
    timeout: Duration,
}

impl PriceResolver {
    pub fn new(api: Arc<dyn BrokerApi>, time_provider: Box<dyn TimeProvider>, timeout: Duration) -> PriceResolver {
        PriceResolver {api, time_provider, timeout}
    }

    /// Returns close price of the most recent candle for the specified instrument.
    pub async fn resolve(&self, figi: &str) -> GenericResult<Decimal> {
        match tokio::time::timeout(self.timeout, self.resolve_within_windows(figi)).await {
            Ok(result) => result,
            Err(_) => Err!(
                "Unable to determine current price for {figi}: the operation has timed out ({:?})",
                self.timeout),
        }
    }

    async fn resolve_within_windows(&self, figi: &str) -> GenericResult<Decimal> {
        let mut tried = Vec::new();

        for window in price_windows() {
            let to = self.time_provider.now().duration_trunc(window.truncate_to)?;
            let from = to - window.lookback;

            trace!("Getting {figi} {} candles for {from} - {to}...", window.interval);
            let candles = self.api.get_candles(figi, from, to, window.interval).await?;

            if let Some(candle) = latest_candle(&candles) {
                if !candle.close_price.is_zero() {
                    debug!("{figi}: current price is {} ({} candle at {}).",
                           candle.close_price, window.interval, candle.time);
                    return Ok(candle.close_price);
                }
            }

            tried.push(format_window(window.interval, from, to));
        }

        Err!("Current price can't be determined for {figi}: there are no candles for {}",
             tried.iter().join(", "))
    }
}

fn latest_candle(candles: &[Candle]) -> Option<&Candle> {
    // The first one wins among candles with the same time
    candles.iter().min_by_key(|candle| Reverse(candle.time))
}

fn format_window(interval: CandleInterval, from: UtcDateTime, to: UtcDateTime) -> String {
    format!("{interval} interval ({} - {})", from.format("%Y-%m-%d %H:%M"), to.format("%Y-%m-%d %H:%M"))
}
