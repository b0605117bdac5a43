use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::time::UtcDateTime;
use crate::types::Decimal;

#[derive(Serialize, Deserialize, Display, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Buy,
    BuyCard,
    Sell,
    Dividend,
    TaxDividend,
    ServiceCommission,
    TaxBack,
    #[serde(other)]
    Other,
}

impl OperationType {
    pub const TRADES: [OperationType; 3] = [OperationType::Buy, OperationType::BuyCard, OperationType::Sell];
}

#[derive(Serialize, Deserialize, Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Done,
    Decline,
    Progress,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MoneyAmount {
    pub currency: String,
    pub value: Decimal,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: String,
    pub status: OperationStatus,
    pub operation_type: OperationType,
    pub date: UtcDateTime,

    #[serde(default)]
    pub figi: Option<String>,
    pub currency: String,
    pub payment: Decimal,
    #[serde(default)]
    pub commission: Option<MoneyAmount>,
    #[serde(default)]
    pub quantity: i64,
}

impl Operation {
    /// Returns FIGI of the instrument the operation belongs to or `None` for account level operations
    /// (service commissions, tax refunds, etc.).
    pub fn instrument(&self) -> Option<&str> {
        self.figi.as_deref().filter(|figi| !figi.is_empty())
    }
}

/// A conjunction of operation matching criteria.
///
/// Each empty criteria matches everything, so `OperationFilter::all()` matches all operations.
#[derive(Default, Debug, Clone)]
pub struct OperationFilter {
    instruments: Vec<String>,
    account_operations: bool,
    status: Option<OperationStatus>,
    types: Vec<OperationType>,
    excluded_instruments: Vec<String>,
}

impl OperationFilter {
    pub fn all() -> OperationFilter {
        OperationFilter::default()
    }

    pub fn with_instruments<I, S>(mut self, figis: I) -> OperationFilter
        where I: IntoIterator<Item=S>, S: Into<String>
    {
        self.instruments.extend(figis.into_iter().map(Into::into));
        self
    }

    /// Makes instrument filter to pass account level operations. If no instruments are specified, only
    /// account level operations are matched.
    pub fn with_account_operations(mut self) -> OperationFilter {
        self.account_operations = true;
        self
    }

    pub fn with_status(mut self, status: OperationStatus) -> OperationFilter {
        self.status = Some(status);
        self
    }

    pub fn with_types(mut self, types: &[OperationType]) -> OperationFilter {
        self.types.extend_from_slice(types);
        self
    }

    pub fn excluding<I, S>(mut self, figis: I) -> OperationFilter
        where I: IntoIterator<Item=S>, S: Into<String>
    {
        self.excluded_instruments.extend(figis.into_iter().map(Into::into));
        self
    }

    pub fn matches(&self, operation: &Operation) -> bool {
        let instrument = operation.instrument();

        let any_instrument = self.instruments.is_empty() && !self.account_operations;

        let instrument_matches = any_instrument || match instrument {
            Some(figi) => self.instruments.iter().any(|other| other == figi),
            None => self.account_operations,
        };

        let excluded = instrument.is_some_and(|figi| {
            self.excluded_instruments.iter().any(|other| other == figi)
        });

        instrument_matches && !excluded &&
            self.status.is_none_or(|status| operation.status == status) &&
            (self.types.is_empty() || self.types.contains(&operation.operation_type))
    }
}

/// Selects operations matching the filter preserving their order. Returns nothing if no filter is
/// specified: use `OperationFilter::all()` to select all operations.
pub fn filter_operations(operations: &[Operation], filter: Option<&OperationFilter>) -> Vec<Operation> {
    let Some(filter) = filter else {
        return Vec::new();
    };

    operations.iter().filter(|operation| filter.matches(operation)).cloned().collect()
}

/// Groups operations by instrument. Account level operations aren't included into any group.
pub fn group_by_instrument(operations: &[Operation]) -> HashMap<String, Vec<Operation>> {
    let mut groups: HashMap<String, Vec<Operation>> = HashMap::new();

    for operation in operations {
        if let Some(figi) = operation.instrument() {
            groups.entry(figi.to_owned()).or_default().push(operation.clone());
        }
    }

    groups
}
