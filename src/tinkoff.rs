use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::api::{BrokerApi, Candle, CandleInterval, Instrument, Position};
use crate::config::TimeoutsConfig;
use crate::core::GenericResult;
use crate::http;
use crate::operations::Operation;
use crate::rate_limiter::RateLimiter;
use crate::time::UtcDateTime;
use crate::util;

const API_URL: &str = "https://api-invest.tinkoff.ru/openapi";
const SANDBOX_API_URL: &str = "https://api-invest.tinkoff.ru/openapi/sandbox";

#[derive(Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TinkoffApiConfig {
    #[validate(length(min = 1))]
    pub api_token: String,

    #[serde(default)]
    pub sandbox: bool,

    #[validate(length(min = 1))]
    pub broker_account_id: Option<String>,
}

impl TinkoffApiConfig {
    #[cfg(test)]
    pub fn mock() -> TinkoffApiConfig {
        TinkoffApiConfig {
            api_token: s!("token-mock"),
            sandbox: false,
            broker_account_id: None,
        }
    }
}

// Tinkoff Investments OpenAPI v1 (https://tinkoff.github.io/invest-openapi/)
pub struct TinkoffApi {
    url: String,
    token: String,
    client: Client,
    rate_limiter: RateLimiter,
    timeouts: TimeoutsConfig,
}

impl TinkoffApi {
    pub fn new(config: &TinkoffApiConfig, timeouts: &TimeoutsConfig) -> GenericResult<TinkoffApi> {
        let url = if config.sandbox {
            SANDBOX_API_URL
        } else {
            API_URL
        };
        TinkoffApi::with_url(url, config, timeouts)
    }

    fn with_url(url: &str, config: &TinkoffApiConfig, timeouts: &TimeoutsConfig) -> GenericResult<TinkoffApi> {
        Ok(TinkoffApi {
            url: url.to_owned(),
            token: config.api_token.clone(),
            client: Client::new(),
            rate_limiter: RateLimiter::new().with_limit(120, Duration::from_secs(60))?,
            timeouts: timeouts.clone(),
        })
    }

    async fn query<R: DeserializeOwned>(
        &self, method: &str, params: &[(&str, &str)], timeout: Duration,
    ) -> GenericResult<R> {
        let url = format!("{}{}", self.url, method);
        let url = if params.is_empty() {
            Url::parse(&url)?
        } else {
            Url::parse_with_params(&url, params)?
        };

        self.rate_limiter.wait(&format!("request to {url}")).await;
        let response = http::send_request(&self.client, &url, Some(&self.token), timeout).await?;

        let status = response.status();
        let body = http::read_body(response).await?;

        parse_reply(status, &body)
    }
}

#[async_trait]
impl BrokerApi for TinkoffApi {
    async fn get_operations(
        &self, account_id: Option<&str>, from: UtcDateTime, to: UtcDateTime, figi: Option<&str>,
    ) -> GenericResult<Vec<Operation>> {
        #[derive(Deserialize)]
        struct Payload {
            operations: Vec<Operation>,
        }

        let (from, to) = (format_time(from), format_time(to));

        let mut params = vec![("from", from.as_str()), ("to", to.as_str())];
        if let Some(figi) = figi {
            params.push(("figi", figi));
        }
        if let Some(account_id) = account_id {
            params.push(("brokerAccountId", account_id));
        }

        let payload: Payload = self.query("/operations", &params, self.timeouts.operations).await
            .map_err(|e| format!("Failed to get operations for {from} - {to}: {e}"))?;

        Ok(payload.operations)
    }

    async fn get_portfolio_positions(&self, account_id: Option<&str>) -> GenericResult<Vec<Position>> {
        #[derive(Deserialize)]
        struct Payload {
            positions: Vec<Position>,
        }

        let mut params = Vec::new();
        if let Some(account_id) = account_id {
            params.push(("brokerAccountId", account_id));
        }

        let payload: Payload = self.query("/portfolio", &params, self.timeouts.portfolio).await
            .map_err(|e| format!("Failed to get portfolio: {e}"))?;

        Ok(payload.positions)
    }

    async fn get_candles(
        &self, figi: &str, from: UtcDateTime, to: UtcDateTime, interval: CandleInterval,
    ) -> GenericResult<Vec<Candle>> {
        #[derive(Deserialize)]
        struct Payload {
            candles: Vec<Candle>,
        }

        let (from, to) = (format_time(from), format_time(to));

        let payload: Payload = self.query("/market/candles", &[
            ("figi", figi),
            ("from", from.as_str()),
            ("to", to.as_str()),
            ("interval", interval.into()),
        ], self.timeouts.candles).await.map_err(|e| format!("Failed to get candles for {figi}: {e}"))?;

        for candle in &payload.candles {
            if candle.interval != interval {
                return Err!(
                    "Failed to get candles for {figi}: Got an unexpected candle interval: {}",
                    candle.interval);
            }

            util::validate_non_negative("candle close price", candle.close_price)
                .map_err(|e| format!("Failed to get candles for {figi}: {e}"))?;
        }

        Ok(payload.candles)
    }

    async fn get_instrument(&self, figi: &str) -> GenericResult<Instrument> {
        let instrument: Instrument = self.query(
            "/market/search/by-figi", &[("figi", figi)], self.timeouts.instrument,
        ).await.map_err(|e| format!("Failed to get {figi} instrument info: {e}"))?;

        if instrument.figi != figi {
            return Err!("Failed to get {figi} instrument info: Got {} instrument instead", instrument.figi);
        }

        Ok(instrument)
    }
}

fn format_time(time: UtcDateTime) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_reply<R: DeserializeOwned>(status: StatusCode, body: &str) -> GenericResult<R> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Reply {
        tracking_id: Option<String>,
        status: String,
        #[serde(default)]
        payload: serde_json::Value,
    }

    #[derive(Deserialize)]
    struct ErrorPayload {
        message: Option<String>,
        code: Option<String>,
    }

    let reply: Reply = match serde_json::from_str(body) {
        Ok(reply) => reply,
        Err(_) if !status.is_success() => return Err(http::server_error(status, body)),
        Err(err) => return Err!("Got an invalid response: {err}"),
    };

    if !status.is_success() || reply.status != "Ok" {
        let tracking_id = reply.tracking_id.as_deref().unwrap_or("unknown");
        let error: ErrorPayload = serde_json::from_value(reply.payload).unwrap_or(ErrorPayload {
            message: None,
            code: None,
        });

        let message = error.message.or(error.code).unwrap_or_else(|| reply.status.clone());
        return Err!("Server returned an error ({status}, tracking ID {tracking_id}): {message}");
    }

    Ok(serde_json::from_value(reply.payload).map_err(|e| format!(
        "Got an invalid response: {e}"))?)
}
