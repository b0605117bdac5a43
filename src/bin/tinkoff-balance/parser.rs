use clap::{Arg, ArgAction, ArgMatches, Command};
use indoc::indoc;

use tinkoff_balance::balance::BalanceRequest;
use tinkoff_balance::config::Config;
use tinkoff_balance::core::GenericResult;
use tinkoff_balance::time::{self, Date};

use super::action::Action;

pub struct Parser {
    matches: Option<ArgMatches>,
}

pub struct GlobalOptions {
    pub log_level: log::Level,
    pub config_dir: String,
}

impl Parser {
    pub fn new() -> Parser {
        Parser {matches: None}
    }

    pub fn parse_global(&mut self) -> GenericResult<GlobalOptions> {
        const DEFAULT_CONFIG_DIR_PATH: &str = "~/.tinkoff-balance";

        let matches = new_app().get_matches();

        let log_level = match matches.get_count("verbose") {
            0 => log::Level::Info,
            1 => log::Level::Debug,
            2 => log::Level::Trace,
            _ => return Err("Invalid verbosity level".into()),
        };

        let config_dir = expand_path(
            matches.get_one::<String>("config").map(String::as_str).unwrap_or(DEFAULT_CONFIG_DIR_PATH));

        self.matches = Some(matches);

        Ok(GlobalOptions {log_level, config_dir})
    }

    pub fn parse(self, config: &Config) -> GenericResult<Action> {
        let matches = self.matches.ok_or("Command line arguments haven't been parsed yet")?;
        let (command, matches) = matches.subcommand().ok_or("Command is not specified")?;

        let request = parse_request(matches, config.period_start)?;
        let json = matches.get_flag("json");

        Ok(match command {
            "balance" => Action::Balance {request, json},
            "operations" => Action::Operations {request, json},
            _ => return Err(format!("Unknown command: {command}").into()),
        })
    }
}

fn new_app() -> Command {
    new_command(
        "tinkoff-balance", "Calculates portfolio balance from Tinkoff Investments operations history")
        .version(env!("CARGO_PKG_VERSION"))
        .help_expected(true)
        .disable_help_subcommand(true)
        .dont_collapse_args_in_usage(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .args([
            new_arg("config", "Configuration directory path [default: ~/.tinkoff-balance]")
                .short('c').long("config")
                .value_name("PATH"),

            new_arg("verbose", "Set verbosity level")
                .short('v').long("verbose")
                .action(ArgAction::Count),
        ])

        .subcommand(new_command(
            "balance", "Calculate balance of every instrument and per-currency totals")
            .long_about("\
                Calculates balance of every instrument traded within the specified period as its \
                current value plus received dividends minus paid dividend taxes, net trade \
                payments and broker commissions. Totals are additionally adjusted by service \
                commissions and tax refunds.")
            .args(filter_args()))

        .subcommand(new_command(
            "operations", "Show operations the balance is calculated from")
            .args(filter_args()))
}

fn new_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        // Default template contains `{bin} {version}` for some reason
        .help_template(indoc!("
            {before-help}{about}

            {usage-heading}
                {usage}

            {all-args}{after-help}\
        "))
        .about(about)
}

fn new_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).help(help)
}

fn filter_args() -> [Arg; 6] {
    [
        new_arg("from", "Period start date (in DD.MM.YYYY format) [default: period_start from config]")
            .short('f').long("from")
            .value_name("DATE"),

        new_arg("to", "Period end date, inclusive (in DD.MM.YYYY format) [default: now]")
            .short('t').long("to")
            .value_name("DATE"),

        new_arg("figi", "Process only the specified instrument")
            .long("figi")
            .value_name("FIGI"),

        new_arg("portfolio", "Process only instruments from the current portfolio")
            .short('p').long("portfolio")
            .action(ArgAction::SetTrue),

        new_arg("exclude", "Exclude the specified instrument")
            .short('e').long("exclude")
            .value_name("FIGI")
            .action(ArgAction::Append),

        new_arg("json", "Output in JSON format")
            .long("json")
            .action(ArgAction::SetTrue),
    ]
}

fn parse_request(matches: &ArgMatches, default_from: Date) -> GenericResult<BalanceRequest> {
    let (period_from, period_to) = time::parse_period(
        matches.get_one::<String>("from").map(String::as_str),
        matches.get_one::<String>("to").map(String::as_str),
        default_from, time::now())?;

    Ok(BalanceRequest {
        period_from,
        period_to,
        figi: matches.get_one::<String>("figi").cloned(),
        for_portfolio: matches.get_flag("portfolio"),
        exclude_figis: matches.get_many::<String>("exclude")
            .map(|figis| figis.cloned().collect())
            .unwrap_or_default(),
    })
}

fn expand_path(path: &str) -> String {
    shellexpand::tilde(path).to_string()
}
