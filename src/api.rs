//! Broker API abstraction the balance calculation is built on.
//!
//! The only production implementation is [`crate::tinkoff::TinkoffApi`], but everything above this
//! layer works with `dyn BrokerApi`, so it can be replaced with an in-memory implementation in tests.

use async_trait::async_trait;
use serde::Deserialize;
use strum::{Display, IntoStaticStr};

use crate::core::GenericResult;
use crate::operations::Operation;
use crate::time::UtcDateTime;
use crate::types::Decimal;

#[async_trait]
pub trait BrokerApi: Send + Sync {
    async fn get_operations(
        &self, account_id: Option<&str>, from: UtcDateTime, to: UtcDateTime, figi: Option<&str>,
    ) -> GenericResult<Vec<Operation>>;

    async fn get_portfolio_positions(&self, account_id: Option<&str>) -> GenericResult<Vec<Position>>;

    async fn get_candles(
        &self, figi: &str, from: UtcDateTime, to: UtcDateTime, interval: CandleInterval,
    ) -> GenericResult<Vec<Candle>>;

    async fn get_instrument(&self, figi: &str) -> GenericResult<Instrument>;
}

#[derive(Deserialize, Display, IntoStaticStr, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandleInterval {
    #[serde(rename = "1min")]
    #[strum(serialize = "1min")]
    Minute,

    #[serde(rename = "hour")]
    #[strum(serialize = "hour")]
    Hour,

    #[serde(rename = "day")]
    #[strum(serialize = "day")]
    Day,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Candle {
    pub time: UtcDateTime,
    pub interval: CandleInterval,

    #[serde(rename = "c")]
    pub close_price: Decimal,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Instrument {
    pub figi: String,
    pub ticker: String,
    pub name: String,
    pub currency: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Position {
    pub figi: String,
    pub balance: Decimal,
}
