use log::{debug, warn};
use serde::Serialize;

use crate::api::{BrokerApi, Instrument};
use crate::core::GenericResult;
use crate::operations::{Operation, OperationType};
use crate::types::Decimal;
use crate::util;

use super::price::PriceResolver;

/// Reconciled summary of all operations with a single instrument.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct BalanceLine {
    pub figi: String,
    pub ticker: String,
    pub name: String,
    pub currency: String,

    pub operation_amount: Decimal,
    pub broker_commission_amount: Decimal,
    pub current_price: Decimal,
    pub portfolio_quantity: i64,
    pub portfolio_amount: Decimal,
    pub dividend_amount: Decimal,
    pub dividend_tax_amount: Decimal,

    // portfolio + dividends - dividend taxes - operations - broker commissions
    pub balance_amount: Decimal,
}

pub async fn calculate_balance_line(
    api: &dyn BrokerApi, price_resolver: &PriceResolver, figi: &str, operations: &[Operation],
) -> GenericResult<BalanceLine> {
    debug!("Calculating balance for {figi} ({} operations)...", operations.len());

    let price = price_resolver.resolve(figi).await?;
    let instrument = api.get_instrument(figi).await?;

    Ok(build_balance_line(instrument, price, operations))
}

pub fn build_balance_line(instrument: Instrument, current_price: Decimal, operations: &[Operation]) -> BalanceLine {
    let mut operation_amount = Decimal::ZERO;
    let mut broker_commission_amount = Decimal::ZERO;
    let mut quantity: i64 = 0;
    let mut dividend_amount = Decimal::ZERO;
    let mut dividend_tax_amount = Decimal::ZERO;

    for operation in operations {
        match operation.operation_type {
            OperationType::Buy | OperationType::BuyCard | OperationType::Sell => {
                let sign = if operation.operation_type == OperationType::Sell {
                    -1
                } else {
                    1
                };

                if let Some(commission) = operation.commission.as_ref() {
                    broker_commission_amount += commission.value.abs();
                }
                operation_amount += Decimal::from(sign) * operation.payment.abs();
                quantity += sign * operation.quantity;
            },
            OperationType::Dividend => dividend_amount += operation.payment.abs(),
            OperationType::TaxDividend => dividend_tax_amount += operation.payment.abs(),
            _ => {},
        }
    }

    if quantity < 0 {
        warn!(
            "{} ({}): operations history results in negative quantity ({}). Considering it as zero.",
            instrument.ticker, instrument.figi, quantity);
        quantity = 0;
    }

    let portfolio_amount = util::round(Decimal::from(quantity) * current_price);
    let operation_amount = util::round(operation_amount);
    let broker_commission_amount = util::round(broker_commission_amount);
    let dividend_amount = util::round(dividend_amount);
    let dividend_tax_amount = util::round(dividend_tax_amount);

    let balance_amount = util::round(
        portfolio_amount + dividend_amount - dividend_tax_amount - operation_amount - broker_commission_amount);

    BalanceLine {
        figi: instrument.figi,
        ticker: instrument.ticker,
        name: instrument.name,
        currency: instrument.currency,

        operation_amount,
        broker_commission_amount,
        current_price,
        portfolio_quantity: quantity,
        portfolio_amount,
        dividend_amount,
        dividend_tax_amount,

        balance_amount,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::api::testing::ApiMock;
    use crate::operations::testing::{operation, trade};
    use crate::time::FakeTime;

    use super::*;

    const FIGI: &str = "BBG000B9XRY4";

    fn instrument() -> Instrument {
        Instrument {
            figi: s!(FIGI),
            ticker: s!("AAPL"),
            name: s!("Apple"),
            currency: s!("USD"),
        }
    }

    fn resolver(api: &ApiMock) -> PriceResolver {
        let now = Utc.with_ymd_and_hms(2020, 6, 3, 15, 42, 17).unwrap();
        PriceResolver::new(Arc::new(api.clone()), Box::new(FakeTime::new(now)), Duration::from_secs(10))
    }

    #[test]
    fn single_buy() {
        let operations = [trade("1", FIGI, OperationType::Buy, 10, dec!(-1000), dec!(-5))];

        assert_eq!(build_balance_line(instrument(), dec!(120), &operations), BalanceLine {
            figi: s!(FIGI),
            ticker: s!("AAPL"),
            name: s!("Apple"),
            currency: s!("USD"),

            operation_amount: dec!(1000),
            broker_commission_amount: dec!(5),
            current_price: dec!(120),
            portfolio_quantity: 10,
            portfolio_amount: dec!(1200),
            dividend_amount: dec!(0),
            dividend_tax_amount: dec!(0),

            balance_amount: dec!(195),
        });
    }

    #[test]
    fn trades_and_dividends() {
        let operations = [
            trade("1", FIGI, OperationType::Buy, 10, dec!(-1000.004), dec!(-3.001)),
            trade("2", FIGI, OperationType::BuyCard, 5, dec!(-612.5), dec!(-1.84)),
            trade("3", FIGI, OperationType::Sell, 7, dec!(903.35), dec!(-2.71)),
            operation("4", Some(FIGI), OperationType::Dividend, "USD", dec!(8.2)),
            operation("5", Some(FIGI), OperationType::TaxDividend, "USD", dec!(-0.82)),
            operation("6", Some(FIGI), OperationType::Dividend, "USD", dec!(4.105)),
            operation("7", Some(FIGI), OperationType::Other, "USD", dec!(-100)),
        ];

        let line = build_balance_line(instrument(), dec!(130.125), &operations);

        assert_eq!(line.portfolio_quantity, 8);
        assert_eq!(line.portfolio_amount, dec!(1041));
        assert_eq!(line.operation_amount, dec!(709.15));
        assert_eq!(line.broker_commission_amount, dec!(7.55));
        assert_eq!(line.dividend_amount, dec!(12.31));
        assert_eq!(line.dividend_tax_amount, dec!(0.82));
        assert_eq!(line.balance_amount, dec!(335.79));
        assert_eq!(line.balance_amount, util::round(
            line.portfolio_amount + line.dividend_amount - line.dividend_tax_amount -
            line.operation_amount - line.broker_commission_amount));
    }

    #[rstest(operations,
        case(vec![]),
        case(vec![operation("1", Some(FIGI), OperationType::Dividend, "USD", dec!(3))]),
    )]
    fn no_trades(operations: Vec<Operation>) {
        let line = build_balance_line(instrument(), dec!(120), &operations);
        assert_eq!(line.portfolio_quantity, 0);
        assert_eq!(line.portfolio_amount, dec!(0));
    }

    #[test]
    fn negative_quantity() {
        let operations = [
            trade("1", FIGI, OperationType::Buy, 1, dec!(-100), dec!(-1)),
            trade("2", FIGI, OperationType::Sell, 3, dec!(330), dec!(-1)),
        ];

        let line = build_balance_line(instrument(), dec!(110), &operations);
        assert_eq!(line.portfolio_quantity, 0);
        assert_eq!(line.portfolio_amount, dec!(0));
        assert_eq!(line.operation_amount, dec!(-230));
        assert_eq!(line.balance_amount, dec!(228));
    }

    #[test]
    fn rounding_idempotence() {
        let operations = [
            trade("1", FIGI, OperationType::Buy, 3, dec!(-100.333), dec!(-0.125)),
            operation("2", Some(FIGI), OperationType::Dividend, "USD", dec!(0.005)),
        ];

        let line = build_balance_line(instrument(), dec!(33.3333), &operations);

        for value in [
            line.operation_amount, line.broker_commission_amount, line.portfolio_amount,
            line.dividend_amount, line.dividend_tax_amount, line.balance_amount,
        ] {
            assert_eq!(util::round(value), value);
        }
    }

    #[tokio::test]
    async fn calculation() {
        let api = ApiMock::new().with_instrument(FIGI, "AAPL", "USD", dec!(120));
        let operations = [trade("1", FIGI, OperationType::Buy, 10, dec!(-1000), dec!(-5))];

        let line = calculate_balance_line(&api, &resolver(&api), FIGI, &operations).await.unwrap();
        assert_eq!(line.ticker, "AAPL");
        assert_eq!(line.current_price, dec!(120));
        assert_eq!(line.balance_amount, dec!(195));
    }

    #[tokio::test]
    async fn instrument_error() {
        let api = ApiMock::new()
            .with_instrument(FIGI, "AAPL", "USD", dec!(120))
            .with_instrument_error(FIGI, "Instrument info is unavailable");

        let error = calculate_balance_line(&api, &resolver(&api), FIGI, &[]).await.unwrap_err();
        assert_eq!(error.to_string(), "Instrument info is unavailable");
    }

    #[tokio::test]
    async fn price_error() {
        let api = ApiMock::new().with_candles_error(FIGI, crate::api::CandleInterval::Minute, "Rate limit exceeded");

        let error = calculate_balance_line(&api, &resolver(&api), FIGI, &[]).await.unwrap_err();
        assert_eq!(error.to_string(), "Rate limit exceeded");
    }
}
