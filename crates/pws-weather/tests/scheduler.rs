//! Scheduler timing and lifecycle tests on a paused clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use pws_weather::{
    Cadence, DailyForecastEntry, HistoricalObservation, HistoryGranularity, Observation,
    RefreshScheduler, SchedulerState, SharedSettings, StateStore, StationSettings, UnitSet, Units,
    WeatherApi, WeatherError,
};
use tokio::sync::{Notify, Semaphore};

/// Counts calls per endpoint. Optionally holds `fetch_current` until released.
#[derive(Default)]
struct CountingApi {
    current: AtomicUsize,
    forecast: AtomicUsize,
    history: AtomicUsize,
    gate: Option<Semaphore>,
    started: Notify,
}

impl CountingApi {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        })
    }

    fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(16);
        }
    }

    fn current_calls(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    fn forecast_calls(&self) -> usize {
        self.forecast.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherApi for CountingApi {
    async fn fetch_current(
        &self,
        station_id: &str,
        _: &str,
        _: Units,
    ) -> Result<Observation, WeatherError> {
        let call = self.current.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }
        Ok(Observation {
            station_id: Some(station_id.to_string()),
            epoch: Some(call as i64),
            ..Observation::default()
        })
    }

    async fn fetch_historical(
        &self,
        _: &str,
        _: &str,
        _: NaiveDate,
        _: HistoryGranularity,
        _: Units,
    ) -> Result<Vec<HistoricalObservation>, WeatherError> {
        self.history.fetch_add(1, Ordering::SeqCst);
        Ok(vec![HistoricalObservation {
            units: Some(UnitSet {
                precip_total: Some(1.0),
                ..UnitSet::default()
            }),
            ..HistoricalObservation::default()
        }])
    }

    async fn fetch_historical_range(
        &self,
        _: &str,
        _: &str,
        _: NaiveDate,
        _: NaiveDate,
        _: Units,
    ) -> Result<Vec<HistoricalObservation>, WeatherError> {
        self.history.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    async fn fetch_daily_forecast(
        &self,
        _: &str,
        _: f64,
        _: f64,
        _: Units,
        _: &str,
    ) -> Result<Vec<DailyForecastEntry>, WeatherError> {
        self.forecast.fetch_add(1, Ordering::SeqCst);
        let date = DateTime::parse_from_rfc3339("2025-06-20T07:00:00+02:00").unwrap();
        Ok(vec![DailyForecastEntry {
            date,
            day_of_week: "Freitag".to_string(),
            max_temp: Some(24),
            min_temp: Some(12),
            narrative: None,
            qpf: None,
            qpf_snow: None,
            sunrise: None,
            sunset: None,
            moonrise: None,
            moonset: None,
            moon_phase: None,
            moon_phase_code: None,
            day: None,
            night: None,
        }])
    }
}

fn shared_settings(auto_refresh: bool) -> SharedSettings {
    StationSettings {
        station_id: "IMELLE12".to_string(),
        api_key: "secret".to_string(),
        latitude: 52.2,
        longitude: 8.3,
        auto_refresh,
        ..StationSettings::default()
    }
    .into_shared()
}

fn scheduler(api: Arc<CountingApi>, settings: SharedSettings) -> RefreshScheduler {
    RefreshScheduler::new(api, settings, StateStore::new(), Cadence::default())
}

#[tokio::test(start_paused = true)]
async fn test_restart_keeps_one_timer_per_cadence() {
    let api = CountingApi::new();
    let scheduler = scheduler(api.clone(), shared_settings(true));

    scheduler.start();
    scheduler.start();
    assert_eq!(scheduler.state(), SchedulerState::Running);

    tokio::time::sleep(Duration::from_secs(150)).await;

    // Immediate refresh plus ticks at 60 s and 120 s; forecast only once
    assert_eq!(api.current_calls(), 3);
    assert_eq!(api.forecast_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_disarms_timers() {
    let api = CountingApi::new();
    let scheduler = scheduler(api.clone(), shared_settings(true));

    scheduler.start();
    tokio::time::sleep(Duration::from_secs(1)).await;
    scheduler.stop();
    assert_eq!(scheduler.state(), SchedulerState::Stopped);

    let (current, forecast) = (api.current_calls(), api.forecast_calls());
    tokio::time::sleep(Duration::from_secs(600)).await;

    assert_eq!(api.current_calls(), current);
    assert_eq!(api.forecast_calls(), forecast);
}

#[tokio::test(start_paused = true)]
async fn test_late_result_after_stop_is_discarded() {
    let api = CountingApi::gated();
    let scheduler = scheduler(api.clone(), shared_settings(true));
    let store = scheduler.store().clone();

    scheduler.start();
    api.started.notified().await;
    assert!(store.snapshot().loading);

    scheduler.stop();
    let before = store.snapshot();
    assert!(!before.loading);

    api.release();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let after = store.snapshot();
    assert_eq!(after, before);
    assert!(after.current.is_none());
    assert!(!after.loading);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_auto_refresh_skips_ticks_until_enabled() {
    let api = CountingApi::new();
    let settings = shared_settings(false);
    let scheduler = scheduler(api.clone(), settings.clone());

    scheduler.start();
    tokio::time::sleep(Duration::from_secs(150)).await;
    assert_eq!(api.current_calls(), 0);
    assert_eq!(api.forecast_calls(), 0);

    settings.write().auto_refresh = true;
    tokio::time::sleep(Duration::from_secs(60)).await;

    // Next current tick at 180 s; forecast waits for 300 s
    assert_eq!(api.current_calls(), 1);
    assert_eq!(api.forecast_calls(), 0);
}

#[tokio::test]
async fn test_refresh_now_ignores_auto_refresh_flag() {
    let api = CountingApi::new();
    let scheduler = scheduler(api.clone(), shared_settings(false));

    scheduler.refresh_now().await;

    assert_eq!(api.current_calls(), 1);
    assert_eq!(api.forecast_calls(), 1);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);

    let state = scheduler.store().snapshot();
    assert_eq!(state.current.unwrap().station_id.as_deref(), Some("IMELLE12"));
    assert_eq!(state.metrics.prior_day_precipitation, Some(1.0));
    assert_eq!(state.metrics.week_precipitation, Some(0.0));
    assert_eq!(state.forecast.len(), 1);
    assert!(!state.loading);
}

#[tokio::test(start_paused = true)]
async fn test_current_cycle_fetches_metrics_concurrently() {
    let api = CountingApi::new();
    let scheduler = scheduler(api.clone(), shared_settings(true));

    scheduler.start();
    tokio::time::sleep(Duration::from_secs(1)).await;

    // Prior day and week range, once each
    assert_eq!(api.history.load(Ordering::SeqCst), 2);
    scheduler.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tick_blocked_on_settings_cannot_publish_after_stop() {
    let api = CountingApi::new();
    let settings = shared_settings(true);
    let cadence = Cadence {
        current: Duration::from_millis(300),
        forecast: Duration::from_secs(300),
    };
    let scheduler = RefreshScheduler::new(api.clone(), settings.clone(), StateStore::new(), cadence);
    let store = scheduler.store().clone();
    let mut rx = store.subscribe();

    scheduler.start();
    rx.wait_for(|state| state.current.is_some()).await.unwrap();

    // The next tick fires while the write lock is held and waits in the auto-refresh check
    let guard = settings.write();
    std::thread::sleep(Duration::from_millis(500));
    scheduler.stop();
    let before = store.snapshot();
    let calls = api.current_calls();
    drop(guard);

    tokio::time::sleep(Duration::from_millis(400)).await;

    let after = store.snapshot();
    assert_eq!(after.current.as_ref().and_then(|o| o.epoch), Some(0));
    assert_eq!(after, before);
    assert_eq!(api.current_calls(), calls);
}
