//! Payload decoding for the observation, history and forecast endpoints.
//!
//! Only the top-level structure of each payload is required. Every leaf is
//! optional; leaves the decoder had to leave empty are listed in the
//! returned [`DecodeReport`].

use chrono::Datelike;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::dates::{self, Language};
use crate::error::WeatherError;
use crate::types::{
    DailyForecastEntry, DaypartDetail, HistoricalObservation, Observation, UnitSet, Units,
};

/// Field paths that were missing or unparseable and left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeReport {
    defaulted: Vec<String>,
}

impl DecodeReport {
    fn note(&mut self, path: impl Into<String>) {
        self.defaulted.push(path.into());
    }

    pub fn defaulted(&self) -> &[String] {
        &self.defaulted
    }

    pub fn is_clean(&self) -> bool {
        self.defaulted.is_empty()
    }
}

/// A decoded value together with what had to be defaulted to build it.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub report: DecodeReport,
}

#[derive(Debug, Deserialize)]
struct ObservationsEnvelope<T> {
    observations: Option<Vec<T>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnitSets {
    imperial: Option<UnitSet>,
    metric: Option<UnitSet>,
    #[serde(rename = "uk_hybrid")]
    uk_hybrid: Option<UnitSet>,
    #[serde(rename = "metric_si")]
    metric_si: Option<UnitSet>,
}

impl UnitSets {
    fn take(self, units: Units) -> Option<UnitSet> {
        match units {
            Units::English => self.imperial,
            Units::Metric => self.metric,
            Units::UkHybrid => self.uk_hybrid,
            Units::MetricSi => self.metric_si,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationWire {
    #[serde(alias = "stationID")]
    station_id: Option<String>,
    obs_time_utc: Option<String>,
    obs_time_local: Option<String>,
    epoch: Option<i64>,
    lat: Option<f64>,
    lon: Option<f64>,
    neighborhood: Option<String>,
    country: Option<String>,
    software_type: Option<String>,
    solar_radiation: Option<f64>,
    uv: Option<f64>,
    realtime_frequency: Option<i64>,
    qc_status: Option<i32>,
    humidity: Option<f64>,
    winddir: Option<f64>,
    #[serde(flatten)]
    unit_sets: UnitSets,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoricalWire {
    #[serde(alias = "stationID")]
    station_id: Option<String>,
    tz: Option<String>,
    obs_time_utc: Option<String>,
    obs_time_local: Option<String>,
    epoch: Option<i64>,
    lat: Option<f64>,
    lon: Option<f64>,
    humidity_avg: Option<f64>,
    humidity_high: Option<f64>,
    humidity_low: Option<f64>,
    winddir_avg: Option<f64>,
    solar_radiation_high: Option<f64>,
    uv_high: Option<f64>,
    qc_status: Option<i32>,
    #[serde(flatten)]
    unit_sets: UnitSets,
}

type Column<T> = Option<Vec<Option<T>>>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DailyForecastWire {
    calendar_day_temperature_max: Column<i32>,
    calendar_day_temperature_min: Column<i32>,
    temperature_max: Column<i32>,
    temperature_min: Column<i32>,
    day_of_week: Column<String>,
    narrative: Column<String>,
    qpf: Column<f64>,
    qpf_snow: Column<f64>,
    sunrise_time_local: Column<String>,
    sunset_time_local: Column<String>,
    moonrise_time_local: Column<String>,
    moonset_time_local: Column<String>,
    moon_phase: Column<String>,
    moon_phase_code: Column<String>,
    valid_time_local: Column<String>,
    daypart: Option<Vec<DaypartWire>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DaypartWire {
    day_or_night: Column<String>,
    daypart_name: Column<String>,
    icon_code: Column<i32>,
    temperature: Column<i32>,
    temperature_heat_index: Column<i32>,
    temperature_wind_chill: Column<i32>,
    wind_speed: Column<i32>,
    wind_direction: Column<i32>,
    wind_direction_cardinal: Column<String>,
    wind_phrase: Column<String>,
    precip_chance: Column<i32>,
    precip_type: Column<String>,
    qpf: Column<f64>,
    relative_humidity: Column<i32>,
    uv_index: Column<i32>,
    uv_description: Column<String>,
    cloud_cover: Column<i32>,
    narrative: Column<String>,
    wx_phrase_short: Column<String>,
    wx_phrase_long: Column<String>,
}

/// Bounds-checked read of one cell of a structure-of-arrays column.
fn at<T: Clone>(column: &Column<T>, index: usize) -> Option<T> {
    column.as_ref()?.get(index)?.clone()
}

/// Errors carry the JSON path of the offending value; `root` when there is none.
fn parse_json<T: DeserializeOwned>(body: &str, root: &str) -> Result<T, WeatherError> {
    let mut de = serde_json::Deserializer::from_str(body);
    let value = serde_path_to_error::deserialize(&mut de).map_err(|e| {
        let path = e.path().to_string();
        let path = if path == "." { root.to_string() } else { path };
        WeatherError::decode(path, e.into_inner())
    })?;
    de.end().map_err(|e| WeatherError::decode(root, e))?;
    Ok(value)
}

fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, WeatherError> {
    // 204 No Content: the station has nothing for the requested period
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let envelope: ObservationsEnvelope<T> = parse_json(body, "observations")?;
    envelope
        .observations
        .ok_or_else(|| WeatherError::decode("observations", "missing observations array"))
}

/// Decode a current-observations payload (`{ "observations": [...] }`).
///
/// # Errors
/// `WeatherError::Decode` if the body is not JSON or has no `observations` array.
pub fn decode_observations(
    body: &str,
    units: Units,
) -> Result<Decoded<Vec<Observation>>, WeatherError> {
    let wires: Vec<ObservationWire> = decode_envelope(body)?;
    let mut report = DecodeReport::default();

    let value = wires
        .into_iter()
        .enumerate()
        .map(|(i, w)| {
            let path = format!("observations[{}]", i);
            let obs_time_utc = w.obs_time_utc.as_deref().and_then(dates::parse_utc_timestamp);
            if obs_time_utc.is_none() {
                report.note(format!("{}.obsTimeUtc", path));
            }
            let obs_time_local = w
                .obs_time_local
                .as_deref()
                .and_then(dates::parse_local_timestamp);
            if obs_time_local.is_none() {
                report.note(format!("{}.obsTimeLocal", path));
            }
            let unit_set = w.unit_sets.take(units);
            if unit_set.is_none() {
                report.note(format!("{}.{}", path, units.payload_key()));
            }

            Observation {
                station_id: w.station_id,
                obs_time_utc,
                obs_time_local,
                epoch: w.epoch,
                latitude: w.lat,
                longitude: w.lon,
                neighborhood: w.neighborhood,
                country: w.country,
                software_type: w.software_type,
                solar_radiation: w.solar_radiation,
                uv: w.uv,
                realtime_frequency: w.realtime_frequency,
                qc_status: w.qc_status,
                humidity: w.humidity,
                wind_direction: w.winddir,
                units: unit_set,
            }
        })
        .collect();

    Ok(Decoded { value, report })
}

/// Decode an hourly or daily history payload.
///
/// # Errors
/// `WeatherError::Decode` if the body is not JSON or has no `observations` array.
pub fn decode_history(
    body: &str,
    units: Units,
) -> Result<Decoded<Vec<HistoricalObservation>>, WeatherError> {
    let wires: Vec<HistoricalWire> = decode_envelope(body)?;
    let mut report = DecodeReport::default();

    let value = wires
        .into_iter()
        .enumerate()
        .map(|(i, w)| {
            let path = format!("observations[{}]", i);
            let obs_time_local = w
                .obs_time_local
                .as_deref()
                .and_then(dates::parse_local_timestamp);
            if obs_time_local.is_none() {
                report.note(format!("{}.obsTimeLocal", path));
            }
            let unit_set = w.unit_sets.take(units);
            if unit_set.is_none() {
                report.note(format!("{}.{}", path, units.payload_key()));
            }

            HistoricalObservation {
                station_id: w.station_id,
                timezone: w.tz,
                obs_time_utc: w.obs_time_utc.as_deref().and_then(dates::parse_utc_timestamp),
                obs_time_local,
                epoch: w.epoch,
                latitude: w.lat,
                longitude: w.lon,
                humidity_avg: w.humidity_avg,
                humidity_high: w.humidity_high,
                humidity_low: w.humidity_low,
                wind_direction_avg: w.winddir_avg,
                solar_radiation_high: w.solar_radiation_high,
                uv_high: w.uv_high,
                qc_status: w.qc_status,
                units: unit_set,
            }
        })
        .collect();

    Ok(Decoded { value, report })
}

/// Decode the structure-of-arrays daily forecast into one entry per day.
///
/// `language` must be the language the forecast was requested in; daypart
/// labels are matched against weekday names in that language.
///
/// # Errors
/// `WeatherError::Decode` if the body is not JSON or has no `validTimeLocal` array.
pub fn decode_daily_forecast(
    body: &str,
    language: &str,
) -> Result<Decoded<Vec<DailyForecastEntry>>, WeatherError> {
    let wire: DailyForecastWire = parse_json(body, "<root>")?;
    let days = wire
        .valid_time_local
        .as_ref()
        .map(Vec::len)
        .ok_or_else(|| WeatherError::decode("validTimeLocal", "missing validTimeLocal array"))?;

    let language = Language::from_tag(language);
    let dayparts = wire.daypart.as_ref().and_then(|d| d.first());
    let mut report = DecodeReport::default();
    let mut entries = Vec::with_capacity(days);

    for i in 0..days {
        let Some(date) = at(&wire.valid_time_local, i)
            .as_deref()
            .and_then(dates::parse_forecast_time)
        else {
            report.note(format!("validTimeLocal[{}]", i));
            continue;
        };

        let weekday = language.weekday_name(date.weekday());
        let day_of_week = at(&wire.day_of_week, i).unwrap_or_else(|| {
            report.note(format!("dayOfWeek[{}]", i));
            weekday.to_string()
        });

        let max_temp = at(&wire.calendar_day_temperature_max, i)
            .or_else(|| at(&wire.temperature_max, i));
        let min_temp = at(&wire.calendar_day_temperature_min, i)
            .or_else(|| at(&wire.temperature_min, i));
        if min_temp.is_none() {
            report.note(format!("calendarDayTemperatureMin[{}]", i));
        }

        let (day, night) = match dayparts {
            Some(parts) => (
                select_daypart(parts, i, DayOrNight::Day, weekday, language),
                select_daypart(parts, i, DayOrNight::Night, weekday, language),
            ),
            None => (None, None),
        };
        if day.is_none() {
            report.note(format!("daypart[{}].day", i));
        }
        if night.is_none() {
            report.note(format!("daypart[{}].night", i));
        }

        let time = |column: &Column<String>| {
            at(column, i)
                .as_deref()
                .and_then(dates::parse_forecast_time)
        };

        entries.push(DailyForecastEntry {
            date,
            day_of_week,
            max_temp,
            min_temp,
            narrative: at(&wire.narrative, i),
            qpf: at(&wire.qpf, i),
            qpf_snow: at(&wire.qpf_snow, i),
            sunrise: time(&wire.sunrise_time_local),
            sunset: time(&wire.sunset_time_local),
            moonrise: time(&wire.moonrise_time_local),
            moonset: time(&wire.moonset_time_local),
            moon_phase: at(&wire.moon_phase, i),
            moon_phase_code: at(&wire.moon_phase_code, i),
            day,
            night,
        });
    }

    Ok(Decoded {
        value: entries,
        report,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DayOrNight {
    Day,
    Night,
}

impl DayOrNight {
    fn flag(self) -> &'static str {
        match self {
            Self::Day => "D",
            Self::Night => "N",
        }
    }
}

/// Pick the daypart belonging to forecast day `index`.
///
/// A candidate must carry the right `D`/`N` flag and a label containing the
/// day's weekday name. Day 0 is labelled relatively ("tonight", "today",
/// "tomorrow") instead. Of several candidates the one closest to the day's
/// slot in the flattened day/night sequence wins.
fn select_daypart(
    parts: &DaypartWire,
    index: usize,
    half: DayOrNight,
    weekday: &str,
    language: Language,
) -> Option<DaypartDetail> {
    let labels: Vec<String> = if index == 0 {
        match half {
            DayOrNight::Night => vec![language.tonight().to_string()],
            DayOrNight::Day => vec![
                language.today().to_string(),
                language.tomorrow().to_string(),
            ],
        }
    } else {
        vec![weekday.to_lowercase()]
    };

    let count = [
        parts.daypart_name.as_ref().map_or(0, Vec::len),
        parts.day_or_night.as_ref().map_or(0, Vec::len),
    ]
    .into_iter()
    .max()
    .unwrap_or(0);
    let slot = index * 2 + usize::from(half == DayOrNight::Night);

    (0..count)
        .filter(|&p| at(&parts.day_or_night, p).as_deref() == Some(half.flag()))
        .filter(|&p| {
            at(&parts.daypart_name, p)
                .map(|name| name.to_lowercase())
                .is_some_and(|name| labels.iter().any(|label| name.contains(label.as_str())))
        })
        .min_by_key(|&p| p.abs_diff(slot))
        .map(|p| daypart_at(parts, p))
}

fn daypart_at(parts: &DaypartWire, p: usize) -> DaypartDetail {
    DaypartDetail {
        day_or_night: at(&parts.day_or_night, p),
        name: at(&parts.daypart_name, p),
        icon_code: at(&parts.icon_code, p),
        temperature: at(&parts.temperature, p),
        temperature_heat_index: at(&parts.temperature_heat_index, p),
        temperature_wind_chill: at(&parts.temperature_wind_chill, p),
        wind_speed: at(&parts.wind_speed, p),
        wind_direction: at(&parts.wind_direction, p),
        wind_direction_cardinal: at(&parts.wind_direction_cardinal, p),
        wind_phrase: at(&parts.wind_phrase, p),
        precip_chance: at(&parts.precip_chance, p),
        precip_type: at(&parts.precip_type, p),
        qpf: at(&parts.qpf, p),
        relative_humidity: at(&parts.relative_humidity, p),
        uv_index: at(&parts.uv_index, p),
        uv_description: at(&parts.uv_description, p),
        cloud_cover: at(&parts.cloud_cover, p),
        narrative: at(&parts.narrative, p),
        wx_phrase_short: at(&parts.wx_phrase_short, p),
        wx_phrase_long: at(&parts.wx_phrase_long, p),
    }
}
