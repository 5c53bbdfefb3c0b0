//! Date parsing and formatting for every format the weather API uses.
//!
//! | Where                          | Format                   |
//! |--------------------------------|--------------------------|
//! | `obsTimeUtc`                   | `yyyy-MM-dd'T'HH:mm:ssZ` |
//! | `obsTimeLocal`                 | `yyyy-MM-dd HH:mm:ss`    |
//! | forecast `validTimeLocal` etc. | `yyyy-MM-dd'T'HH:mm:ssZ` (numeric offset) |
//! | query parameters               | `yyyyMMdd`               |

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, Utc, Weekday,
};
use chrono_tz::Tz;

const LOCAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";
const QUERY_DATE_FORMAT: &str = "%Y%m%d";

/// Parse an observation UTC timestamp such as `2019-02-04T14:53:14Z`.
pub fn parse_utc_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, OFFSET_FORMAT))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a station-local timestamp such as `2019-02-04 09:53:14`.
pub fn parse_local_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, LOCAL_FORMAT).ok()
}

/// Parse a forecast timestamp such as `2025-06-20T07:00:00+0200`, keeping the offset.
pub fn parse_forecast_time(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(s, OFFSET_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
}

/// Format a date for the `date`, `startDate` and `endDate` query parameters.
pub fn format_query_date(date: NaiveDate) -> String {
    date.format(QUERY_DATE_FORMAT).to_string()
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Today's calendar date at the station.
///
/// Falls back to the process-local timezone when the station timezone is unknown.
pub fn station_today(tz: Option<Tz>) -> NaiveDate {
    match tz {
        Some(tz) => Utc::now().with_timezone(&tz).date_naive(),
        None => Local::now().date_naive(),
    }
}

/// Language table used for weekday names and relative daypart labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    German,
    English,
}

impl Language {
    /// Resolve a request language tag (`de-DE`, `en-US`, `de`) to a label table.
    /// Unknown languages use English.
    pub fn from_tag(tag: &str) -> Self {
        let primary = tag.split(['-', '_']).next().unwrap_or_default();
        if primary.eq_ignore_ascii_case("de") {
            Self::German
        } else {
            Self::English
        }
    }

    pub fn weekday_name(&self, day: Weekday) -> &'static str {
        match self {
            Self::German => match day {
                Weekday::Mon => "Montag",
                Weekday::Tue => "Dienstag",
                Weekday::Wed => "Mittwoch",
                Weekday::Thu => "Donnerstag",
                Weekday::Fri => "Freitag",
                Weekday::Sat => "Samstag",
                Weekday::Sun => "Sonntag",
            },
            Self::English => match day {
                Weekday::Mon => "Monday",
                Weekday::Tue => "Tuesday",
                Weekday::Wed => "Wednesday",
                Weekday::Thu => "Thursday",
                Weekday::Fri => "Friday",
                Weekday::Sat => "Saturday",
                Weekday::Sun => "Sunday",
            },
        }
    }

    /// Lowercase label of the first forecast night.
    pub fn tonight(&self) -> &'static str {
        match self {
            Self::German => "heute abend",
            Self::English => "tonight",
        }
    }

    pub fn today(&self) -> &'static str {
        match self {
            Self::German => "heute",
            Self::English => "today",
        }
    }

    pub fn tomorrow(&self) -> &'static str {
        match self {
            Self::German => "morgen",
            Self::English => "tomorrow",
        }
    }
}

/// e.g. `Montag, 09.06., 22:44:01`
pub fn format_day_and_date(time: NaiveDateTime, language: Language) -> String {
    format!(
        "{}, {}",
        language.weekday_name(time.weekday()),
        time.format("%d.%m., %H:%M:%S")
    )
}

/// e.g. `09.06.2025`
pub fn format_short_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}
