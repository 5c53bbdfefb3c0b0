//! Weather Company PWS and forecast API client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use pws_core::is_placeholder;
use reqwest::Client;
use tracing::instrument;

use crate::dates;
use crate::decode::{self, Decoded};
use crate::error::WeatherError;
use crate::types::{DailyForecastEntry, HistoricalObservation, HistoryGranularity, Observation, Units};

const WEATHER_API_BASE: &str = "https://api.weather.com";
const CURRENT_PATH: &str = "/v2/pws/observations/current";
const HISTORY_PATH: &str = "/v2/pws/history";
const DAILY_FORECAST_PATH: &str = "/v3/wx/forecast/daily/10day";

/// Per-request timeout so a hung request cannot keep a cycle loading forever.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn require(name: &str, value: &str) -> Result<(), WeatherError> {
    if is_placeholder(value) {
        Err(WeatherError::Configuration(format!("{} is not configured", name)))
    } else {
        Ok(())
    }
}

/// The remote weather API as seen by the refresh engine.
///
/// Every call is an independent, read-only request; implementations must be
/// safe to call concurrently.
#[async_trait]
pub trait WeatherApi: Send + Sync {
    /// Latest observation of a station.
    async fn fetch_current(
        &self,
        station_id: &str,
        api_key: &str,
        units: Units,
    ) -> Result<Observation, WeatherError>;

    /// Hourly or daily history of a single station-local day.
    async fn fetch_historical(
        &self,
        station_id: &str,
        api_key: &str,
        date: NaiveDate,
        granularity: HistoryGranularity,
        units: Units,
    ) -> Result<Vec<HistoricalObservation>, WeatherError>;

    /// Daily history for an inclusive range of days.
    async fn fetch_historical_range(
        &self,
        station_id: &str,
        api_key: &str,
        start: NaiveDate,
        end: NaiveDate,
        units: Units,
    ) -> Result<Vec<HistoricalObservation>, WeatherError>;

    async fn fetch_daily_forecast(
        &self,
        api_key: &str,
        latitude: f64,
        longitude: f64,
        units: Units,
        language: &str,
    ) -> Result<Vec<DailyForecastEntry>, WeatherError>;
}

#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    base_url: String,
}

impl WeatherClient {
    /// Client for the public API with the default timeout.
    ///
    /// # Errors
    /// Fails if the HTTP client cannot be built (TLS backend unavailable).
    pub fn new() -> Result<Self, WeatherError> {
        Self::with_options(WEATHER_API_BASE, DEFAULT_TIMEOUT)
    }

    /// Client against another base URL (proxy, mock server) and timeout.
    ///
    /// # Errors
    /// Fails if the HTTP client cannot be built.
    pub fn with_options(base_url: &str, timeout: Duration) -> Result<Self, WeatherError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the current observation.
    #[instrument(skip(self, api_key), level = "info")]
    pub async fn current(
        &self,
        station_id: &str,
        api_key: &str,
        units: Units,
    ) -> Result<Observation, WeatherError> {
        require("station ID", station_id)?;
        require("API key", api_key)?;

        let body = self
            .get(
                CURRENT_PATH,
                &[
                    ("stationId", station_id.to_string()),
                    ("format", "json".to_string()),
                    ("units", units.code().to_string()),
                    ("apiKey", api_key.to_string()),
                ],
            )
            .await?;

        let decoded = decode::decode_observations(&body, units)?;
        log_report("current observation", &decoded);

        let observation = decoded.value.into_iter().next().ok_or_else(|| {
            WeatherError::NoData(format!("no current observation for station {}", station_id))
        })?;

        tracing::info!(
            neighborhood = observation.neighborhood.as_deref().unwrap_or("N/A"),
            "Current observation loaded"
        );
        Ok(observation)
    }

    /// Fetch hourly or daily history for one day.
    #[instrument(skip(self, api_key), level = "info")]
    pub async fn historical(
        &self,
        station_id: &str,
        api_key: &str,
        date: NaiveDate,
        granularity: HistoryGranularity,
        units: Units,
    ) -> Result<Vec<HistoricalObservation>, WeatherError> {
        require("station ID", station_id)?;
        require("API key", api_key)?;

        let path = format!("{}/{}", HISTORY_PATH, granularity.path_segment());
        let body = self
            .get(
                &path,
                &[
                    ("stationId", station_id.to_string()),
                    ("format", "json".to_string()),
                    ("units", units.code().to_string()),
                    ("date", dates::format_query_date(date)),
                    ("apiKey", api_key.to_string()),
                ],
            )
            .await?;

        let decoded = decode::decode_history(&body, units)?;
        log_report("history", &decoded);
        tracing::info!(count = decoded.value.len(), "Historical observations loaded");
        Ok(decoded.value)
    }

    /// Fetch daily history from `start` through `end`.
    #[instrument(skip(self, api_key), level = "info")]
    pub async fn historical_range(
        &self,
        station_id: &str,
        api_key: &str,
        start: NaiveDate,
        end: NaiveDate,
        units: Units,
    ) -> Result<Vec<HistoricalObservation>, WeatherError> {
        require("station ID", station_id)?;
        require("API key", api_key)?;

        let path = format!("{}/{}", HISTORY_PATH, HistoryGranularity::Daily.path_segment());
        let body = self
            .get(
                &path,
                &[
                    ("stationId", station_id.to_string()),
                    ("format", "json".to_string()),
                    ("units", units.code().to_string()),
                    ("startDate", dates::format_query_date(start)),
                    ("endDate", dates::format_query_date(end)),
                    ("apiKey", api_key.to_string()),
                ],
            )
            .await?;

        let decoded = decode::decode_history(&body, units)?;
        log_report("history range", &decoded);
        Ok(decoded.value)
    }

    /// Fetch the 10-day daily forecast for a location.
    #[instrument(skip(self, api_key), level = "info")]
    pub async fn daily_forecast(
        &self,
        api_key: &str,
        latitude: f64,
        longitude: f64,
        units: Units,
        language: &str,
    ) -> Result<Vec<DailyForecastEntry>, WeatherError> {
        require("forecast API key", api_key)?;
        if latitude == 0.0 && longitude == 0.0 {
            return Err(WeatherError::Configuration(
                "forecast coordinates are not configured".to_string(),
            ));
        }

        let body = self
            .get(
                DAILY_FORECAST_PATH,
                &[
                    ("geocode", format!("{},{}", latitude, longitude)),
                    ("format", "json".to_string()),
                    ("units", units.code().to_string()),
                    ("language", language.to_string()),
                    ("apiKey", api_key.to_string()),
                ],
            )
            .await?;

        let decoded = decode::decode_daily_forecast(&body, language)?;
        log_report("daily forecast", &decoded);
        if decoded.value.is_empty() {
            return Err(WeatherError::NoData("no daily forecast entries".to_string()));
        }

        tracing::info!(days = decoded.value.len(), "Daily forecast loaded");
        Ok(decoded.value)
    }

    /// GET a path and return the body of a 2xx response.
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<String, WeatherError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(path, status = status.as_u16(), "Weather API returned an error status");
            tracing::debug!(path, body = %body, "Error response body");
            return Err(WeatherError::Server {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(path, status = status.as_u16(), bytes = body.len(), "Weather API response");
        Ok(body)
    }
}

fn log_report<T>(what: &str, decoded: &Decoded<T>) {
    if !decoded.report.is_clean() {
        tracing::debug!(
            defaulted = ?decoded.report.defaulted(),
            "{} decoded with defaulted fields",
            what
        );
    }
}

#[async_trait]
impl WeatherApi for WeatherClient {
    async fn fetch_current(
        &self,
        station_id: &str,
        api_key: &str,
        units: Units,
    ) -> Result<Observation, WeatherError> {
        self.current(station_id, api_key, units).await
    }

    async fn fetch_historical(
        &self,
        station_id: &str,
        api_key: &str,
        date: NaiveDate,
        granularity: HistoryGranularity,
        units: Units,
    ) -> Result<Vec<HistoricalObservation>, WeatherError> {
        self.historical(station_id, api_key, date, granularity, units)
            .await
    }

    async fn fetch_historical_range(
        &self,
        station_id: &str,
        api_key: &str,
        start: NaiveDate,
        end: NaiveDate,
        units: Units,
    ) -> Result<Vec<HistoricalObservation>, WeatherError> {
        self.historical_range(station_id, api_key, start, end, units)
            .await
    }

    async fn fetch_daily_forecast(
        &self,
        api_key: &str,
        latitude: f64,
        longitude: f64,
        units: Units,
        language: &str,
    ) -> Result<Vec<DailyForecastEntry>, WeatherError> {
        self.daily_forecast(api_key, latitude, longitude, units, language)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> WeatherClient {
        WeatherClient::with_options(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_current_sends_expected_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/pws/observations/current"))
            .and(query_param("stationId", "IMELLE12"))
            .and(query_param("format", "json"))
            .and(query_param("units", "m"))
            .and(query_param("apiKey", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "observations": [
                    { "stationID": "IMELLE12", "neighborhood": "Melle", "metric": { "temp": 14.3 } },
                    { "stationID": "SECOND", "neighborhood": "Elsewhere" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let obs = client_for(&server)
            .current("IMELLE12", "secret", Units::Metric)
            .await
            .unwrap();

        assert_eq!(obs.station_id.as_deref(), Some("IMELLE12"));
        assert_eq!(obs.neighborhood.as_deref(), Some("Melle"));
        assert_eq!(obs.units.unwrap().temp, Some(14.3));
    }

    #[tokio::test]
    async fn test_current_empty_observations_is_no_data() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/pws/observations/current"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "observations": [] })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .current("IMELLE12", "secret", Units::Metric)
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::NoData(_)));
        assert!(err.user_message().contains("No weather data"));
    }

    #[tokio::test]
    async fn test_current_no_content_is_no_data() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/pws/observations/current"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .current("IMELLE12", "secret", Units::Metric)
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::NoData(_)));
    }

    #[tokio::test]
    async fn test_current_missing_observations_is_decode_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/pws/observations/current"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "metadata": {} })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .current("IMELLE12", "secret", Units::Metric)
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::Decode { ref path, .. } if path == "observations"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_server_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/pws/observations/current"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid apiKey"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .current("IMELLE12", "bad", Units::Metric)
            .await
            .unwrap_err();

        match err {
            WeatherError::Server { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid apiKey");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_placeholder_credentials_skip_network() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .current("YOUR_STATION_ID", "secret", Units::Metric)
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::Configuration(_)));

        let err = client
            .historical("IMELLE12", "", date(2025, 6, 9), HistoryGranularity::Daily, Units::Metric)
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::Configuration(_)));

        let err = client
            .daily_forecast("secret", 0.0, 0.0, Units::Metric, "de-DE")
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_historical_hourly_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/pws/history/hourly"))
            .and(query_param("date", "20250609"))
            .and(query_param("stationId", "IMELLE12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "observations": [
                    { "obsTimeLocal": "2025-06-09 00:59:56", "metric": { "precipTotal": 0.0 } },
                    { "obsTimeLocal": "2025-06-09 01:59:56", "metric": { "precipTotal": 0.3 } }
                ]
            })))
            .mount(&server)
            .await;

        let history = client_for(&server)
            .historical(
                "IMELLE12",
                "secret",
                date(2025, 6, 9),
                HistoryGranularity::Hourly,
                Units::Metric,
            )
            .await
            .unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[1].precip_total(), Some(0.3));
    }

    #[tokio::test]
    async fn test_historical_range_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/pws/history/daily"))
            .and(query_param("startDate", "20250616"))
            .and(query_param("endDate", "20250618"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "observations": [
                    { "metric": { "precipTotal": 1.0 } },
                    { "metric": { "precipTotal": 2.0 } },
                    { "metric": {} }
                ]
            })))
            .mount(&server)
            .await;

        let days = client_for(&server)
            .historical_range(
                "IMELLE12",
                "secret",
                date(2025, 6, 16),
                date(2025, 6, 18),
                Units::Metric,
            )
            .await
            .unwrap();

        assert_eq!(days.len(), 3);
    }

    #[tokio::test]
    async fn test_daily_forecast_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v3/wx/forecast/daily/10day"))
            .and(query_param("geocode", "52.2039,8.3374"))
            .and(query_param("language", "de-DE"))
            .and(query_param("units", "m"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "dayOfWeek": ["Freitag"],
                "calendarDayTemperatureMax": [24],
                "calendarDayTemperatureMin": [12],
                "validTimeLocal": ["2025-06-20T07:00:00+0200"]
            })))
            .mount(&server)
            .await;

        let days = client_for(&server)
            .daily_forecast("secret", 52.2039, 8.3374, Units::Metric, "de-DE")
            .await
            .unwrap();

        assert_eq!(days.len(), 1);
        assert_eq!(days[0].day_of_week, "Freitag");
        assert_eq!(days[0].max_temp, Some(24));
    }

    #[tokio::test]
    async fn test_daily_forecast_empty_is_no_data() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v3/wx/forecast/daily/10day"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "validTimeLocal": [] })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .daily_forecast("secret", 52.2, 8.3, Units::Metric, "de-DE")
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::NoData(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        // Nothing listens on port 9 of localhost
        let client = WeatherClient::with_options("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client
            .current("IMELLE12", "secret", Units::Metric)
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::Network(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_slow_response_times_out_as_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CURRENT_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "observations": [] }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = WeatherClient::with_options(&server.uri(), Duration::from_millis(200)).unwrap();
        let err = client
            .current("IMELLE12", "secret", Units::Metric)
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::Network(_)), "{err:?}");
        assert!(err.is_transient());
        assert!(err.to_string().contains("timed out"), "{err}");
    }
}
