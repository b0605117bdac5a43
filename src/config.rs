use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::core::{EmptyResult, GenericResult};
use crate::time::{self, Date};
use crate::tinkoff::TinkoffApiConfig;

#[derive(Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[validate(nested)]
    pub tinkoff: TinkoffApiConfig,

    #[serde(default = "default_base_currencies")]
    #[validate(length(min = 1), custom(function = "validate_currency_list"))]
    pub base_currencies: Vec<String>,

    #[serde(default = "default_period_start", deserialize_with = "time::deserialize_date")]
    pub period_start: Date,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

impl Config {
    pub fn new(config_dir: &str) -> GenericResult<Config> {
        let path = Path::new(config_dir).join("config.yaml");
        Config::load(&path).map_err(|e| format!(
            "Error while reading {:?} configuration file: {}", path, e).into())
    }

    pub fn load(path: &Path) -> GenericResult<Config> {
        let mut data = Vec::new();
        File::open(path)?.read_to_end(&mut data)?;
        Config::parse(&data)
    }

    fn parse(data: &[u8]) -> GenericResult<Config> {
        let config: Config = serde_yaml::from_slice(data)?;
        config.validate()?;
        config.validate_inner()?;
        Ok(config)
    }

    fn validate_inner(&self) -> EmptyResult {
        let mut currencies = HashSet::new();

        for currency in &self.base_currencies {
            if !currencies.insert(currency) {
                return Err!("Duplicated base currency: {currency}");
            }
        }

        self.timeouts.validate_inner()
    }

    #[cfg(test)]
    pub fn mock() -> Config {
        Config {
            tinkoff: TinkoffApiConfig::mock(),
            base_currencies: default_base_currencies(),
            period_start: default_period_start(),
            timeouts: TimeoutsConfig::default(),
        }
    }
}

fn default_base_currencies() -> Vec<String> {
    ["RUB", "USD", "EUR"].iter().map(|&currency| currency.to_owned()).collect()
}

fn default_period_start() -> Date {
    Date::from_ymd_opt(2015, 1, 1).unwrap()
}

fn validate_currency_list<C, I>(currencies: C) -> Result<(), ValidationError>
    where
        C: IntoIterator<Item = I>,
        I: AsRef<str>,
{
    lazy_static! {
        static ref CURRENCY_REGEX: Regex = Regex::new(r"^[A-Z]{3}$").unwrap();
    }

    for currency in currencies.into_iter() {
        if !CURRENCY_REGEX.is_match(currency.as_ref()) {
            return Err(ValidationError::new("Invalid currency code"));
        }
    }

    Ok(())
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct TimeoutsConfig {
    /// Overall time to calculate balance for all instruments
    #[serde(default = "default_aggregation_timeout", deserialize_with = "time::deserialize_duration")]
    pub aggregation: Duration,

    /// Time to determine current price of a single instrument
    #[serde(default = "default_price_timeout", deserialize_with = "time::deserialize_duration")]
    pub price: Duration,

    #[serde(default = "default_operations_timeout", deserialize_with = "time::deserialize_duration")]
    pub operations: Duration,

    #[serde(default = "default_portfolio_timeout", deserialize_with = "time::deserialize_duration")]
    pub portfolio: Duration,

    #[serde(default = "default_instrument_timeout", deserialize_with = "time::deserialize_duration")]
    pub instrument: Duration,

    #[serde(default = "default_candles_timeout", deserialize_with = "time::deserialize_duration")]
    pub candles: Duration,
}

impl TimeoutsConfig {
    fn validate_inner(&self) -> EmptyResult {
        if self.candles > self.price {
            return Err!(
                "Candles request timeout ({:?}) is greater than price resolution timeout ({:?})",
                self.candles, self.price);
        }
        Ok(())
    }
}

impl Default for TimeoutsConfig {
    fn default() -> TimeoutsConfig {
        TimeoutsConfig {
            aggregation: default_aggregation_timeout(),
            price: default_price_timeout(),
            operations: default_operations_timeout(),
            portfolio: default_portfolio_timeout(),
            instrument: default_instrument_timeout(),
            candles: default_candles_timeout(),
        }
    }
}

fn default_aggregation_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_price_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_operations_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_portfolio_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_instrument_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_candles_timeout() -> Duration {
    Duration::from_secs(10)
}
