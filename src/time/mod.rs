mod parsing;

use chrono::{Local, LocalResult, TimeZone, Utc};

use crate::core::GenericResult;

pub use chrono::DateTime as TzDateTime;
pub use crate::types::Date;

pub use parsing::*;

pub type UtcDateTime = TzDateTime<Utc>;

pub fn now() -> UtcDateTime {
    Utc::now()
}

// Start of the day in local time zone
pub fn date_start(date: Date) -> GenericResult<UtcDateTime> {
    let time = date.and_hms_opt(0, 0, 0).ok_or_else(|| format!("Invalid date: {date}"))?;

    Ok(match Local.from_local_datetime(&time) {
        LocalResult::Single(time) | LocalResult::Ambiguous(time, _) => time.with_timezone(&Utc),
        LocalResult::None => return Err!("Invalid local time: {time}"),
    })
}

/// Converts user-specified dates into a `[from, to)` period. Both dates are inclusive, so the period ends at
/// the start of the day following `to`. Missing `from` defaults to `default_from`, missing `to` - to `now`.
pub fn parse_period(
    from: Option<&str>, to: Option<&str>, default_from: Date, now: UtcDateTime,
) -> GenericResult<(UtcDateTime, UtcDateTime)> {
    let period_from = date_start(match from {
        Some(date) => parse_user_date(date)?,
        None => default_from,
    })?;

    let period_to = match to {
        Some(date) => {
            let date = parse_user_date(date)?;
            date_start(date.succ_opt().ok_or_else(|| format!("Invalid date: {date}"))?)?
        },
        None => now,
    };

    if period_from >= period_to {
        return Err!("Invalid period: {} - {}",
            period_from.with_timezone(&Local).format("%d.%m.%Y %H:%M"),
            period_to.with_timezone(&Local).format("%d.%m.%Y %H:%M"));
    }

    Ok((period_from, period_to))
}

pub trait TimeProvider: Sync + Send {
    fn now(&self) -> UtcDateTime;
}

pub struct SystemTime();

impl TimeProvider for SystemTime {
    fn now(&self) -> UtcDateTime {
        now()
    }
}

pub struct FakeTime(UtcDateTime);

impl FakeTime {
    pub fn new<T: TimeZone>(time: TzDateTime<T>) -> FakeTime {
        FakeTime(time.with_timezone(&Utc))
    }
}

impl TimeProvider for FakeTime {
    fn now(&self) -> UtcDateTime {
        self.0
    }
}
