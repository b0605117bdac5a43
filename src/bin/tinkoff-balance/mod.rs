mod action;
mod parser;

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use log::error;

use tinkoff_balance::api::BrokerApi;
use tinkoff_balance::balance::Balance;
use tinkoff_balance::config::Config;
use tinkoff_balance::core::EmptyResult;
use tinkoff_balance::formatting;
use tinkoff_balance::time::SystemTime;
use tinkoff_balance::tinkoff::TinkoffApi;

use self::action::Action;
use self::parser::{Parser, GlobalOptions};

fn main() -> ExitCode {
    let mut parser = Parser::new();

    let global = match parser.parse_global() {
        Ok(global) => global,
        Err(err) => {
            let _ = writeln!(io::stderr(), "{err}.");
            return ExitCode::FAILURE;
        },
    };

    if let Err(err) = easy_logging::init(module_path!(), global.log_level) {
        let _ = writeln!(io::stderr(), "Failed to initialize the logging: {err}.");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Failed to start the runtime: {err}.");
            return ExitCode::FAILURE;
        },
    };

    if let Err(err) = runtime.block_on(run(global, parser)) {
        let message = err.to_string();

        if message.contains('\n') {
            error!("{err}");
        } else {
            error!("{err}.");
        }

        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn run(global: GlobalOptions, parser: Parser) -> EmptyResult {
    let config = Config::new(&global.config_dir)?;
    let action = parser.parse(&config)?;

    let api: Arc<dyn BrokerApi> = Arc::new(TinkoffApi::new(&config.tinkoff, &config.timeouts)?);
    let balance = Balance::new(api, &config, Box::new(SystemTime()));

    match action {
        Action::Balance {request, json} => {
            let report = balance.get_portfolio_balance(&request).await?;

            if json {
                formatting::print_json(&report)?;
            } else {
                formatting::print_balance(&report);
            }
        },

        Action::Operations {request, json} => {
            let operations = balance.get_operations(&request).await?;

            if json {
                formatting::print_json(&operations)?;
            } else {
                formatting::print_operations(&operations);
            }
        },
    }

    Ok(())
}
