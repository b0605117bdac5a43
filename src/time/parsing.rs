use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde::de::{Deserializer, Error};

use crate::core::GenericResult;

use super::Date;

pub fn parse_date(date: &str, format: &str) -> GenericResult<Date> {
    Ok(Date::parse_from_str(date, format).map_err(|_| format!(
        "Invalid date: {:?}", date))?)
}

pub fn parse_user_date(date: &str) -> GenericResult<Date> {
    parse_date(date, "%Y.%m.%d").or_else(|_| parse_date(date, "%d.%m.%Y"))
}

pub fn deserialize_date<'de, D>(deserializer: D) -> Result<Date, D::Error>
    where D: Deserializer<'de>
{
    let date: String = Deserialize::deserialize(deserializer)?;
    parse_user_date(&date).map_err(D::Error::custom)
}

pub fn parse_duration(string: &str) -> GenericResult<Duration> {
    lazy_static! {
        static ref REGEX: Regex = Regex::new(r"^(?P<number>[1-9]\d*)(?P<unit>[smh])$").unwrap();
    }

    let seconds = REGEX.captures(string).and_then(|captures| {
        let duration = captures.name("number").unwrap().as_str().parse::<u64>().ok()?;

        Some(duration * match captures.name("unit").unwrap().as_str() {
            "s" => 1,
            "m" => 60,
            "h" => 60 * 60,
            _ => unreachable!(),
        })
    }).ok_or_else(|| format!("Invalid duration: {}", string))?;

    Ok(Duration::from_secs(seconds))
}

pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where D: Deserializer<'de>
{
    let duration: String = Deserialize::deserialize(deserializer)?;
    parse_duration(&duration).map_err(D::Error::custom)
}
