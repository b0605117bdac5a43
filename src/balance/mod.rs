mod aggregation;
mod item;
mod price;
mod total;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use serde::Serialize;

use crate::api::BrokerApi;
use crate::config::Config;
use crate::core::GenericResult;
use crate::operations::{self, Operation, OperationFilter, OperationStatus};
use crate::time::{TimeProvider, UtcDateTime};

pub use self::item::{BalanceLine, build_balance_line};
pub use self::price::PriceResolver;
pub use self::total::CurrencyTotal;

use self::total::TotalsCalculator;

#[derive(Debug)]
pub struct BalanceRequest {
    pub period_from: UtcDateTime,
    pub period_to: UtcDateTime,
    pub figi: Option<String>,
    pub for_portfolio: bool,
    pub exclude_figis: Vec<String>,
}

#[derive(Serialize, Debug)]
pub struct BalanceReport {
    pub items: Vec<BalanceLine>,
    pub totals: BTreeMap<String, CurrencyTotal>,
}

pub struct Balance {
    api: Arc<dyn BrokerApi>,
    price_resolver: Arc<PriceResolver>,
    account_id: Option<String>,
    base_currencies: Vec<String>,
    aggregation_timeout: Duration,
}

impl Balance {
    pub fn new(api: Arc<dyn BrokerApi>, config: &Config, time_provider: Box<dyn TimeProvider>) -> Balance {
        let price_resolver = PriceResolver::new(api.clone(), time_provider, config.timeouts.price);

        Balance {
            api,
            price_resolver: Arc::new(price_resolver),
            account_id: config.tinkoff.broker_account_id.clone(),
            base_currencies: config.base_currencies.clone(),
            aggregation_timeout: config.timeouts.aggregation,
        }
    }

    /// Returns completed operations for the requested period, instrument and scope.
    pub async fn get_operations(&self, request: &BalanceRequest) -> GenericResult<Vec<Operation>> {
        let account_id = self.account_id.as_deref();

        let operations = self.api.get_operations(
            account_id, request.period_from, request.period_to, request.figi.as_deref(),
        ).await?;
        debug!("Got {} operations for {} - {}.", operations.len(), request.period_from, request.period_to);

        let mut filter = OperationFilter::all()
            .with_status(OperationStatus::Done)
            .excluding(&request.exclude_figis);

        if request.for_portfolio {
            let positions = self.api.get_portfolio_positions(account_id).await?;
            filter = filter
                .with_instruments(positions.into_iter().map(|position| position.figi))
                .with_account_operations();
        }

        Ok(operations::filter_operations(&operations, Some(&filter)))
    }

    pub async fn get_portfolio_balance(&self, request: &BalanceRequest) -> GenericResult<BalanceReport> {
        let operations = self.get_operations(request).await?;
        let groups = operations::group_by_instrument(&operations);

        info!("Calculating balance for {} instruments...", groups.len());
        let items = aggregation::aggregate(
            self.api.clone(), self.price_resolver.clone(), groups, self.aggregation_timeout).await?;

        let mut totals = TotalsCalculator::new(&self.base_currencies);
        for item in &items {
            totals.add_line(item);
        }
        totals.add_adjustments(&operations);

        Ok(BalanceReport {
            items,
            totals: totals.finish(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use crate::api::testing::ApiMock;
    use crate::operations::OperationType;
    use crate::operations::testing::{operation, trade};
    use crate::time::FakeTime;

    use super::*;

    const AAPL: &str = "BBG000B9XRY4";
    const MSFT: &str = "BBG000BPH459";
    const SBER: &str = "BBG004730N88";

    fn balance(api: &ApiMock) -> Balance {
        let now = Utc.with_ymd_and_hms(2020, 6, 3, 15, 42, 17).unwrap();
        Balance::new(Arc::new(api.clone()), &Config::mock(), Box::new(FakeTime::new(now)))
    }

    fn request() -> BalanceRequest {
        BalanceRequest {
            period_from: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            period_to: Utc.with_ymd_and_hms(2020, 6, 3, 15, 42, 17).unwrap(),
            figi: None,
            for_portfolio: false,
            exclude_figis: Vec::new(),
        }
    }

    fn api() -> ApiMock {
        let mut declined = trade("5", SBER, OperationType::Buy, 10, dec!(-2500), dec!(-7.5));
        declined.status = OperationStatus::Decline;

        ApiMock::new()
            .with_instrument(AAPL, "AAPL", "USD", dec!(120))
            .with_instrument(MSFT, "MSFT", "USD", dec!(200))
            .with_instrument(SBER, "SBER", "RUB", dec!(250))
            .with_positions(&[AAPL])
            .with_operations(vec![
                trade("1", AAPL, OperationType::Buy, 10, dec!(-1000), dec!(-5)),
                trade("2", MSFT, OperationType::Buy, 1, dec!(-180), dec!(-1)),
                trade("3", MSFT, OperationType::Sell, 1, dec!(190), dec!(-1)),
                operation("4", Some(MSFT), OperationType::Dividend, "USD", dec!(2.5)),
                declined,
                operation("6", None, OperationType::ServiceCommission, "RUB", dec!(-99)),
                operation("7", Some(""), OperationType::TaxBack, "USD", dec!(1.5)),
            ])
    }

    fn balances(report: &BalanceReport) -> Vec<(&str, crate::types::Decimal)> {
        let mut balances: Vec<_> = report.items.iter()
            .map(|item| (item.ticker.as_str(), item.balance_amount))
            .collect();
        balances.sort();
        balances
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn portfolio_balance() {
        let report = balance(&api()).get_portfolio_balance(&request()).await.unwrap();

        assert_eq!(balances(&report), vec![("AAPL", dec!(195)), ("MSFT", dec!(10.5))]);
        assert_eq!(report.totals.keys().collect::<Vec<_>>(), ["EUR", "RUB", "USD"]);

        assert_eq!(report.totals["EUR"], CurrencyTotal::default());
        assert_eq!(report.totals["RUB"], CurrencyTotal {
            balance_amount: dec!(-99),
            service_commission_amount: dec!(99),
            tax_back_amount: dec!(0),
            portfolio_amount: dec!(0),
        });
        assert_eq!(report.totals["USD"], CurrencyTotal {
            balance_amount: dec!(207),
            service_commission_amount: dec!(0),
            tax_back_amount: dec!(1.5),
            portfolio_amount: dec!(1200),
        });
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn single_instrument() {
        let api = api();
        let request = BalanceRequest {
            figi: Some(s!(MSFT)),
            ..request()
        };

        let report = balance(&api).get_portfolio_balance(&request).await.unwrap();
        assert_eq!(balances(&report), vec![("MSFT", dec!(10.5))]);
        assert_eq!(api.operation_requests(), vec![Some(s!(MSFT))]);
    }

    #[tokio::test]
    async fn portfolio_operations() {
        let request = BalanceRequest {
            for_portfolio: true,
            ..request()
        };

        let operations = balance(&api()).get_operations(&request).await.unwrap();
        let ids: Vec<_> = operations.iter().map(|operation| operation.id.as_str()).collect();
        assert_eq!(ids, ["1", "6", "7"]);
    }

    #[tokio::test]
    async fn excluded_operations() {
        let request = BalanceRequest {
            exclude_figis: vec![s!(AAPL), s!(SBER)],
            ..request()
        };

        let operations = balance(&api()).get_operations(&request).await.unwrap();
        let ids: Vec<_> = operations.iter().map(|operation| operation.id.as_str()).collect();
        assert_eq!(ids, ["2", "3", "4", "6", "7"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_operations() {
        let request = BalanceRequest {
            period_from: Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap(),
            period_to: Utc.with_ymd_and_hms(2019, 12, 31, 0, 0, 0).unwrap(),
            ..request()
        };

        let report = balance(&api()).get_portfolio_balance(&request).await.unwrap();
        assert_eq!(report.items, Vec::new());
        assert_eq!(report.totals.len(), 3);
        assert!(report.totals.values().all(|total| *total == CurrencyTotal::default()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn instrument_failure() {
        let api = api().with_instrument_error(MSFT, "Failed to get MSFT instrument info: Request timed out");

        let error = balance(&api).get_portfolio_balance(&request()).await.unwrap_err();
        assert_eq!(error.to_string(), "Failed to get MSFT instrument info: Request timed out");
    }
}
