pub mod table;

use itertools::Itertools;
use serde::Serialize;

use crate::balance::{BalanceLine, BalanceReport};
use crate::core::EmptyResult;
use crate::operations::Operation;
use crate::time::UtcDateTime;
use crate::types::Decimal;
use crate::util;

use self::table::{Alignment, Cell, Row, Table};

pub fn format_time(time: UtcDateTime) -> String {
    time.with_timezone(&chrono::Local).format("%d.%m.%Y %H:%M:%S").to_string()
}

pub fn format_amount(value: Decimal) -> String {
    separated_float!(format!("{:.2}", util::round(value)))
}

pub fn print_json<T: Serialize>(value: &T) -> EmptyResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_balance(report: &BalanceReport) {
    let mut table = Table::new();

    for line in sorted_lines(&report.items) {
        table.add_row(Row::new(&[
            Cell::new(&line.figi),
            Cell::new(&line.ticker),
            Cell::new(&line.name),
            Cell::new(&line.currency),
            Cell::new_amount(line.balance_amount),
            Cell::new_amount(line.broker_commission_amount),
            Cell::new_amount(line.portfolio_amount),
            Cell::new_amount(line.dividend_amount - line.dividend_tax_amount),
            Cell::new_empty(),
            Cell::new_empty(),
        ]));
    }

    for (currency, total) in &report.totals {
        table.add_row(Row::new(&[
            Cell::new_empty(),
            Cell::new_empty(),
            Cell::new("Total"),
            Cell::new(currency),
            Cell::new_amount(total.balance_amount),
            Cell::new_empty(),
            Cell::new_amount(total.portfolio_amount),
            Cell::new_empty(),
            Cell::new_amount(total.service_commission_amount),
            Cell::new_amount(total.tax_back_amount),
        ]));
    }

    table::print_table("Balance", &[
        "FIGI", "Ticker", "Name", "Currency", "Balance", "Commission", "Portfolio", "Dividend(-tax)",
        "Service commission", "Tax back",
    ], table);
}

pub fn print_operations(operations: &[Operation]) {
    let mut table = Table::new();

    for operation in operations {
        let commission = operation.commission.as_ref().map(|commission| {
            format!("{} {}", format_amount(commission.value), commission.currency)
        }).unwrap_or_default();

        table.add_row(Row::new(&[
            Cell::new_time(operation.date),
            Cell::new(&operation.id),
            Cell::new(&operation.operation_type.to_string()),
            Cell::new(operation.instrument().unwrap_or_default()),
            Cell::new(&operation.currency),
            Cell::new_amount(operation.payment),
            Cell::new_align(&commission, Alignment::RIGHT),
            Cell::new_quantity(operation.quantity),
        ]));
    }

    table::print_table("Operations", &[
        "Date", "ID", "Type", "FIGI", "Currency", "Payment", "Commission", "Quantity",
    ], table);
}

fn sorted_lines(lines: &[BalanceLine]) -> Vec<&BalanceLine> {
    lines.iter()
        .sorted_by(|a, b| (&a.currency, &a.ticker, &a.figi).cmp(&(&b.currency, &b.ticker, &b.figi)))
        .collect()
}
