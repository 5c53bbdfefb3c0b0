use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unit system requested from the API.
///
/// Observation payloads nest their measurements under an object whose name
/// depends on the unit system (`metric`, `imperial`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Units {
    #[serde(rename = "e")]
    English,
    #[default]
    #[serde(rename = "m")]
    Metric,
    #[serde(rename = "h")]
    UkHybrid,
    #[serde(rename = "s")]
    MetricSi,
}

impl Units {
    /// Query parameter value (`units=m`).
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "e",
            Self::Metric => "m",
            Self::UkHybrid => "h",
            Self::MetricSi => "s",
        }
    }

    /// Name of the nested measurement object in observation payloads.
    pub fn payload_key(&self) -> &'static str {
        match self {
            Self::English => "imperial",
            Self::Metric => "metric",
            Self::UkHybrid => "uk_hybrid",
            Self::MetricSi => "metric_si",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "e" | "english" | "imperial" => Ok(Self::English),
            "m" | "metric" => Ok(Self::Metric),
            "h" | "uk_hybrid" | "hybrid" => Ok(Self::UkHybrid),
            "s" | "metric_si" | "si" => Ok(Self::MetricSi),
            other => Err(format!("unknown unit system: {}", other)),
        }
    }
}

/// Time slice of a historical query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryGranularity {
    Hourly,
    Daily,
}

impl HistoryGranularity {
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
        }
    }
}

/// Measurements that depend on the unit system.
///
/// Current observations fill the point-in-time fields; historical
/// observations fill the avg/high/low variants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnitSet {
    pub temp: Option<f64>,
    pub heat_index: Option<f64>,
    pub dewpt: Option<f64>,
    pub wind_chill: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_gust: Option<f64>,
    pub pressure: Option<f64>,
    pub precip_rate: Option<f64>,
    pub precip_total: Option<f64>,
    pub elev: Option<f64>,

    pub temp_avg: Option<f64>,
    pub temp_high: Option<f64>,
    pub temp_low: Option<f64>,
    pub windspeed_avg: Option<f64>,
    pub windspeed_high: Option<f64>,
    pub windspeed_low: Option<f64>,
    pub windgust_avg: Option<f64>,
    pub windgust_high: Option<f64>,
    pub windgust_low: Option<f64>,
    pub heatindex_avg: Option<f64>,
    pub heatindex_high: Option<f64>,
    pub heatindex_low: Option<f64>,
    pub dewpt_avg: Option<f64>,
    pub dewpt_high: Option<f64>,
    pub dewpt_low: Option<f64>,
    pub windchill_avg: Option<f64>,
    pub windchill_high: Option<f64>,
    pub windchill_low: Option<f64>,
    pub pressure_max: Option<f64>,
    pub pressure_min: Option<f64>,
    pub pressure_trend: Option<f64>,
}

/// A point-in-time reading from a personal weather station.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub station_id: Option<String>,
    pub obs_time_utc: Option<DateTime<Utc>>,
    pub obs_time_local: Option<NaiveDateTime>,
    pub epoch: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub neighborhood: Option<String>,
    pub country: Option<String>,
    pub software_type: Option<String>,
    pub solar_radiation: Option<f64>,
    pub uv: Option<f64>,
    pub realtime_frequency: Option<i64>,
    pub qc_status: Option<i32>,
    pub humidity: Option<f64>,
    pub wind_direction: Option<f64>,
    pub units: Option<UnitSet>,
}

impl Observation {
    /// Precipitation since local midnight, if reported.
    pub fn precip_total(&self) -> Option<f64> {
        self.units.as_ref().and_then(|u| u.precip_total)
    }
}

/// A past time slice (hour or day) with aggregated measurements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalObservation {
    pub station_id: Option<String>,
    pub timezone: Option<String>,
    pub obs_time_utc: Option<DateTime<Utc>>,
    pub obs_time_local: Option<NaiveDateTime>,
    pub epoch: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub humidity_avg: Option<f64>,
    pub humidity_high: Option<f64>,
    pub humidity_low: Option<f64>,
    pub wind_direction_avg: Option<f64>,
    pub solar_radiation_high: Option<f64>,
    pub uv_high: Option<f64>,
    pub qc_status: Option<i32>,
    pub units: Option<UnitSet>,
}

impl HistoricalObservation {
    pub fn precip_total(&self) -> Option<f64> {
        self.units.as_ref().and_then(|u| u.precip_total)
    }
}

/// Day or night half of a forecast day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaypartDetail {
    pub day_or_night: Option<String>,
    pub name: Option<String>,
    pub icon_code: Option<i32>,
    pub temperature: Option<i32>,
    pub temperature_heat_index: Option<i32>,
    pub temperature_wind_chill: Option<i32>,
    pub wind_speed: Option<i32>,
    pub wind_direction: Option<i32>,
    pub wind_direction_cardinal: Option<String>,
    pub wind_phrase: Option<String>,
    pub precip_chance: Option<i32>,
    pub precip_type: Option<String>,
    pub qpf: Option<f64>,
    pub relative_humidity: Option<i32>,
    pub uv_index: Option<i32>,
    pub uv_description: Option<String>,
    pub cloud_cover: Option<i32>,
    pub narrative: Option<String>,
    pub wx_phrase_short: Option<String>,
    pub wx_phrase_long: Option<String>,
}

/// One calendar day of the daily forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecastEntry {
    pub date: DateTime<FixedOffset>,
    pub day_of_week: String,
    pub max_temp: Option<i32>,
    pub min_temp: Option<i32>,
    pub narrative: Option<String>,
    pub qpf: Option<f64>,
    pub qpf_snow: Option<f64>,
    pub sunrise: Option<DateTime<FixedOffset>>,
    pub sunset: Option<DateTime<FixedOffset>>,
    pub moonrise: Option<DateTime<FixedOffset>>,
    pub moonset: Option<DateTime<FixedOffset>>,
    pub moon_phase: Option<String>,
    pub moon_phase_code: Option<String>,
    pub day: Option<DaypartDetail>,
    pub night: Option<DaypartDetail>,
}

impl DailyForecastEntry {
    /// Calendar day in the forecast location's own offset.
    pub fn local_date(&self) -> NaiveDate {
        self.date.date_naive()
    }
}

/// Precipitation aggregates that no single endpoint returns.
///
/// `None` means unknown (the fetch failed), which is distinct from a
/// measured `Some(0.0)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub prior_day_precipitation: Option<f64>,
    pub week_precipitation: Option<f64>,
}
