//! Precipitation aggregates derived from historical daily observations.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};

use crate::client::WeatherApi;
use crate::dates;
use crate::error::WeatherError;
use crate::settings::SharedSettings;
use crate::types::{HistoricalObservation, HistoryGranularity};

/// Sum of daily precipitation totals; days without a value count as zero.
pub fn sum_precipitation(days: &[HistoricalObservation]) -> f64 {
    days.iter().filter_map(HistoricalObservation::precip_total).sum()
}

/// Computes the derived precipitation metrics from the history endpoints.
#[derive(Clone)]
pub struct MetricsCalculator {
    api: Arc<dyn WeatherApi>,
    settings: SharedSettings,
}

impl MetricsCalculator {
    pub fn new(api: Arc<dyn WeatherApi>, settings: SharedSettings) -> Self {
        Self { api, settings }
    }

    /// Total precipitation of the day before `today`.
    ///
    /// `Ok(None)` when the station reported no observation for that day, or
    /// one without a precipitation total.
    pub async fn prior_day_precipitation(
        &self,
        today: NaiveDate,
    ) -> Result<Option<f64>, WeatherError> {
        let (station_id, api_key, units) = {
            let s = self.settings.read();
            (s.station_id.clone(), s.api_key.clone(), s.units)
        };

        let yesterday = today - Duration::days(1);
        let days = self
            .api
            .fetch_historical(
                &station_id,
                &api_key,
                yesterday,
                HistoryGranularity::Daily,
                units,
            )
            .await?;

        let total = days.first().and_then(HistoricalObservation::precip_total);
        tracing::debug!(%yesterday, ?total, "Prior-day precipitation");
        Ok(total)
    }

    /// Cumulative precipitation from Monday of the current week through `today`.
    pub async fn current_week_precipitation(&self, today: NaiveDate) -> Result<f64, WeatherError> {
        let (station_id, api_key, units) = {
            let s = self.settings.read();
            (s.station_id.clone(), s.api_key.clone(), s.units)
        };

        let start = dates::week_start(today);
        let days = self
            .api
            .fetch_historical_range(&station_id, &api_key, start, today, units)
            .await?;

        let total = sum_precipitation(&days);
        tracing::debug!(%start, end = %today, days = days.len(), total, "Week precipitation");
        Ok(total)
    }
}
