use crate::error::{CoreError, Result};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// Parse a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(value: &str) -> Result<Date> {
    Date::parse(value.trim(), DATE_FORMAT)
        .map_err(|e| CoreError::InvalidDate(format!("'{value}' is not a YYYY-MM-DD date: {e}")))
}

pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

/// Validate a wall-clock time in `HH:MM` form.
pub fn parse_clock_time(value: &str) -> Result<(u8, u8)> {
    let invalid = || CoreError::invalid_field("departureTime", format!("'{value}' is not HH:MM"));
    let (h, m) = value.trim().split_once(':').ok_or_else(invalid)?;
    let hour: u8 = h.parse().map_err(|_| invalid())?;
    let minute: u8 = m.parse().map_err(|_| invalid())?;
    if h.len() != 2 || m.len() != 2 || hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok((hour, minute))
}

/// Whole days from `from` until `to` (negative when `to` is in the past).
pub fn days_between(from: Date, to: Date) -> i64 {
    (to - from).whole_days()
}

/// End of a billing period that starts at `start`.
pub fn period_end(start: OffsetDateTime, months: u32) -> OffsetDateTime {
    start + Duration::days(30 * i64::from(months))
}

/// Serde adapter for `YYYY-MM-DD` dates.
pub mod iso_date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S>(date: &Date, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Date, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_date(&s).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use time::Date;

        pub fn serialize<S>(date: &Option<Date>, serializer: S) -> std::result::Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match date {
                Some(d) => serializer.serialize_some(&super::super::format_date(*d)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Option<Date>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = Option::<String>::deserialize(deserializer)?;
            match s.as_deref().map(str::trim) {
                None | Some("") => Ok(None),
                Some(v) => super::super::parse_date(v)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
            }
        }
    }
}
