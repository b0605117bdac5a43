use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::api::BrokerApi;
use crate::core::GenericResult;
use crate::operations::Operation;

use super::item::{BalanceLine, calculate_balance_line};
use super::price::PriceResolver;

/// Calculates balance lines for all instruments concurrently.
///
/// Fails on the first error or when not all lines have been calculated within the specified timeout.
/// All still running calculations are cancelled in this case. The order of the returned lines is
/// unspecified.
pub async fn aggregate(
    api: Arc<dyn BrokerApi>, price_resolver: Arc<PriceResolver>,
    operations: HashMap<String, Vec<Operation>>, timeout: Duration,
) -> GenericResult<Vec<BalanceLine>> {
    let deadline = Instant::now() + timeout;
    let expected = operations.len();

    let (sender, mut receiver) = mpsc::unbounded_channel();
    // Dropping the set aborts all tasks which are still running
    let mut tasks = JoinSet::new();

    for (figi, operations) in operations {
        let api = api.clone();
        let price_resolver = price_resolver.clone();
        let sender = sender.clone();

        tasks.spawn(async move {
            let result = calculate_balance_line(api.as_ref(), &price_resolver, &figi, &operations).await;
            let _ = sender.send(result);
        });
    }
    drop(sender);

    let mut lines = Vec::with_capacity(expected);

    while lines.len() < expected {
        let result = match tokio::time::timeout_at(deadline, receiver.recv()).await {
            Ok(Some(result)) => result,
            Ok(None) => return Err!(
                "Balance calculation has been unexpectedly interrupted: got {} of {} results",
                lines.len(), expected),
            Err(_) => return Err!(
                "Balance calculation has timed out ({:?}): {} of {} instruments are still being processed",
                timeout, expected - lines.len(), expected),
        };

        let line = result?;
        debug!("{}: balance is {} {}.", line.figi, line.balance_amount, line.currency);
        lines.push(line);
    }

    Ok(lines)
}
