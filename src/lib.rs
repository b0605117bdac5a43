#[macro_use] extern crate separator;

#[macro_use] pub mod core;
#[macro_use] pub mod types;

pub mod api;
pub mod balance;
pub mod config;
pub mod formatting;
pub mod operations;
pub mod time;
pub mod tinkoff;

mod http;
mod rate_limiter;
mod util;
