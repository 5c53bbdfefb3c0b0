use std::fmt;
use std::sync::Arc;

use chrono_tz::Tz;
use parking_lot::RwLock;

use crate::dates::Language;
use crate::types::Units;

/// Settings shared between the scheduler and whoever edits them at runtime.
pub type SharedSettings = Arc<RwLock<StationSettings>>;

/// Station and request settings read at the start of every fetch.
#[derive(Clone)]
pub struct StationSettings {
    pub station_id: String,
    pub api_key: String,
    /// Separate key for the forecast endpoint; `api_key` is used when unset.
    pub forecast_api_key: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub units: Units,
    /// Request language tag, e.g. `de-DE`.
    pub language: String,
    pub auto_refresh: bool,
    /// Station timezone; the process timezone is used when unknown.
    pub timezone: Option<Tz>,
}

impl StationSettings {
    pub fn forecast_key(&self) -> &str {
        match self.forecast_api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => key,
            _ => &self.api_key,
        }
    }

    pub fn label_language(&self) -> Language {
        Language::from_tag(&self.language)
    }

    pub fn into_shared(self) -> SharedSettings {
        Arc::new(RwLock::new(self))
    }
}

impl Default for StationSettings {
    fn default() -> Self {
        Self {
            station_id: String::new(),
            api_key: String::new(),
            forecast_api_key: None,
            latitude: 0.0,
            longitude: 0.0,
            units: Units::Metric,
            language: "de-DE".to_string(),
            auto_refresh: true,
            timezone: None,
        }
    }
}

// Keys stay out of logs
impl fmt::Debug for StationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StationSettings")
            .field("station_id", &self.station_id)
            .field("api_key", &"<redacted>")
            .field(
                "forecast_api_key",
                &self.forecast_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("latitude", &self.latitude)
            .field("longitude", &self.longitude)
            .field("units", &self.units)
            .field("language", &self.language)
            .field("auto_refresh", &self.auto_refresh)
            .field("timezone", &self.timezone)
            .finish()
    }
}
