use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use pws_core::{Config, ConfigError};
use pws_weather::dates::{self, Language};
use pws_weather::{
    Cadence, FetchState, HistoryGranularity, RefreshScheduler, StateStore, StationSettings,
    Units, WeatherClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    pws_core::init()?;

    let (config, _warnings) = Config::load_validated().inspect_err(|e| {
        if let Some(config_err) = e.downcast_ref::<ConfigError>() {
            tracing::error!("{}", config_err.user_message());
        }
    })?;

    let settings = station_settings(&config)?;
    let language = settings.label_language();
    let timezone = settings.timezone;
    let settings = settings.into_shared();

    let client = WeatherClient::with_options(
        &config.api.base_url,
        Duration::from_secs(config.refresh.request_timeout_secs),
    )?;
    let store = StateStore::new();
    let cadence = Cadence {
        current: Duration::from_secs(config.refresh.current_interval_secs),
        forecast: Duration::from_secs(config.refresh.forecast_interval_secs),
    };
    let scheduler = RefreshScheduler::new(Arc::new(client), settings, store.clone(), cadence);

    let mut updates = store.subscribe();
    let reporter = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            report(&state, language);
        }
    });

    tracing::info!(station = %config.station.id, "PWS monitor started");
    scheduler.start();
    scheduler
        .load_history(dates::station_today(timezone), HistoryGranularity::Hourly)
        .await;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    scheduler.stop();
    reporter.abort();
    store.reset();
    tracing::info!("PWS monitor stopped");

    Ok(())
}

fn station_settings(config: &Config) -> Result<StationSettings> {
    let units: Units = config
        .station
        .units
        .parse()
        .map_err(ConfigError::Invalid)?;

    Ok(StationSettings {
        station_id: config.station.id.clone(),
        api_key: config.station.api_key.clone(),
        forecast_api_key: config.station.forecast_api_key.clone(),
        latitude: config.station.latitude,
        longitude: config.station.longitude,
        units,
        language: config.station.language.clone(),
        auto_refresh: config.refresh.auto_refresh,
        timezone: config.station.timezone(),
    })
}

/// Log settled states only; intermediate loading states are noise.
fn report(state: &FetchState, language: Language) {
    if state.loading {
        return;
    }

    if let Some(obs) = &state.current {
        let observed = obs
            .obs_time_local
            .map(|t| dates::format_day_and_date(t, language))
            .unwrap_or_else(|| "unknown time".to_string());
        let temp = obs.units.as_ref().and_then(|u| u.temp);

        tracing::info!(
            station = obs.station_id.as_deref().unwrap_or("?"),
            observed = %observed,
            temp = ?temp,
            humidity = ?obs.humidity,
            precip_today = ?obs.precip_total(),
            precip_yesterday = ?state.metrics.prior_day_precipitation,
            precip_week = ?state.metrics.week_precipitation,
            "Current conditions"
        );
    }

    if !state.historical.is_empty() {
        tracing::info!(entries = state.historical.len(), "History loaded");
    }

    for day in state.forecast.iter().take(3) {
        tracing::info!(
            day = %day.day_of_week,
            date = %dates::format_short_date(day.local_date()),
            max = ?day.max_temp,
            min = ?day.min_temp,
            narrative = day.narrative.as_deref().unwrap_or(""),
            "Forecast"
        );
    }

    if let Some(message) = state.error_message() {
        tracing::warn!("{}", message);
    }
}
