use std::collections::BTreeMap;

use log::warn;
use serde::Serialize;

use crate::operations::{self, Operation, OperationFilter, OperationType};
use crate::types::Decimal;
use crate::util;

use super::item::BalanceLine;

#[derive(Serialize, Default, Debug, Clone, PartialEq)]
pub struct CurrencyTotal {
    pub balance_amount: Decimal,
    pub service_commission_amount: Decimal,
    pub tax_back_amount: Decimal,
    pub portfolio_amount: Decimal,
}

/// Rolls balance lines and account-level adjustments up into per-currency totals.
pub struct TotalsCalculator {
    totals: BTreeMap<String, CurrencyTotal>,
}

impl TotalsCalculator {
    pub fn new(base_currencies: &[String]) -> TotalsCalculator {
        TotalsCalculator {
            totals: base_currencies.iter().map(|currency| {
                (currency.clone(), CurrencyTotal::default())
            }).collect(),
        }
    }

    pub fn add_line(&mut self, line: &BalanceLine) {
        let total = self.get(&line.currency);
        total.balance_amount += line.balance_amount;
        total.portfolio_amount += line.portfolio_amount;
    }

    pub fn add_adjustments(&mut self, operations: &[Operation]) {
        let filter = OperationFilter::all().with_types(&[
            OperationType::ServiceCommission, OperationType::TaxBack]);

        for operation in operations::filter_operations(operations, Some(&filter)) {
            let total = self.get(&operation.currency);
            let amount = operation.payment.abs();

            if operation.operation_type == OperationType::ServiceCommission {
                total.service_commission_amount += amount;
                total.balance_amount -= amount;
            } else {
                total.tax_back_amount += amount;
                total.balance_amount += amount;
            }
        }
    }

    pub fn finish(self) -> BTreeMap<String, CurrencyTotal> {
        self.totals.into_iter().map(|(currency, total)| {
            (currency, CurrencyTotal {
                balance_amount: util::round(total.balance_amount),
                service_commission_amount: util::round(total.service_commission_amount),
                tax_back_amount: util::round(total.tax_back_amount),
                portfolio_amount: util::round(total.portfolio_amount),
            })
        }).collect()
    }

    fn get(&mut self, currency: &str) -> &mut CurrencyTotal {
        if !self.totals.contains_key(currency) {
            warn!("Got an unexpected {currency} currency. Adding it to the totals.");
        }
        self.totals.entry(currency.to_owned()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use maplit::btreemap;
    use pretty_assertions::assert_eq;

    use crate::api::Instrument;
    use crate::balance::item::build_balance_line;
    use crate::operations::testing::{operation, trade};

    use super::*;

    fn base_currencies() -> Vec<String> {
        vec![s!("RUB"), s!("USD"), s!("EUR")]
    }

    fn line(figi: &str, currency: &str, quantity: i64, payment: Decimal, price: Decimal) -> BalanceLine {
        let instrument = Instrument {
            figi: s!(figi),
            ticker: s!(figi),
            name: s!(figi),
            currency: s!(currency),
        };
        build_balance_line(instrument, price, &[trade("1", figi, OperationType::Buy, quantity, payment, dec!(0))])
    }

    #[test]
    fn empty() {
        assert_eq!(TotalsCalculator::new(&base_currencies()).finish(), btreemap!{
            s!("EUR") => CurrencyTotal::default(),
            s!("RUB") => CurrencyTotal::default(),
            s!("USD") => CurrencyTotal::default(),
        });
    }

    #[test]
    fn totals() {
        let mut calculator = TotalsCalculator::new(&base_currencies());

        calculator.add_line(&line("BBG000B9XRY4", "USD", 10, dec!(-1000), dec!(120)));
        calculator.add_line(&line("BBG000BPH459", "USD", 2, dec!(-300.005), dec!(140.333)));
        calculator.add_line(&line("BBG004730N88", "RUB", 100, dec!(-25000), dec!(250.5)));

        calculator.add_adjustments(&[
            operation("1", None, OperationType::ServiceCommission, "RUB", dec!(-99)),
            operation("2", Some(""), OperationType::ServiceCommission, "RUB", dec!(-290.5)),
            operation("3", None, OperationType::TaxBack, "RUB", dec!(13)),
            operation("4", None, OperationType::TaxBack, "USD", dec!(0.125)),
            operation("5", Some("BBG000B9XRY4"), OperationType::Dividend, "USD", dec!(100)),
            trade("6", "BBG000B9XRY4", OperationType::Buy, 1, dec!(-120), dec!(-1)),
        ]);

        assert_eq!(calculator.finish(), btreemap!{
            s!("EUR") => CurrencyTotal::default(),
            s!("RUB") => CurrencyTotal {
                balance_amount: dec!(-326.5),
                service_commission_amount: dec!(389.5),
                tax_back_amount: dec!(13),
                portfolio_amount: dec!(25050),
            },
            s!("USD") => CurrencyTotal {
                balance_amount: dec!(180.79),
                service_commission_amount: dec!(0),
                tax_back_amount: dec!(0.13),
                portfolio_amount: dec!(1480.67),
            },
        });
    }

    #[test]
    fn unexpected_currency() {
        let mut calculator = TotalsCalculator::new(&base_currencies());
        calculator.add_line(&line("BBG000BVPV84", "CHF", 1, dec!(-10), dec!(11)));

        let totals = calculator.finish();
        assert_eq!(totals.keys().collect::<Vec<_>>(), ["CHF", "EUR", "RUB", "USD"]);
        assert_eq!(totals["CHF"].balance_amount, dec!(1));
        assert_eq!(totals["CHF"].portfolio_amount, dec!(11));
    }
}
