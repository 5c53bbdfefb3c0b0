//! Periodic refresh of current conditions and the forecast.
//!
//! Two cadences run as independent tasks, each driven by its own interval and
//! stopped through a shared `CancellationToken`. A slow forecast request
//! therefore never delays the current-conditions poll and vice versa.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::client::WeatherApi;
use crate::dates;
use crate::error::WeatherError;
use crate::metrics::MetricsCalculator;
use crate::settings::SharedSettings;
use crate::store::{FetchTicket, StateStore};
use crate::types::HistoryGranularity;

pub const DEFAULT_CURRENT_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_FORECAST_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Polling periods of the two cadences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub current: Duration,
    pub forecast: Duration,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            current: DEFAULT_CURRENT_INTERVAL,
            forecast: DEFAULT_FORECAST_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy)]
enum Job {
    Current,
    Forecast,
}

impl Job {
    fn name(self) -> &'static str {
        match self {
            Job::Current => "current",
            Job::Forecast => "forecast",
        }
    }
}

/// Everything a cycle needs; cloned into each cadence task.
#[derive(Clone)]
struct Worker {
    api: Arc<dyn WeatherApi>,
    metrics: MetricsCalculator,
    settings: SharedSettings,
    store: StateStore,
}

impl Worker {
    fn auto_refresh(&self) -> bool {
        self.settings.read().auto_refresh
    }

    async fn run(&self, job: Job, ticket: FetchTicket) {
        match job {
            Job::Current => self.current_cycle(ticket).await,
            Job::Forecast => self.forecast_cycle(ticket).await,
        }
    }

    /// Current observation plus both precipitation metrics, concurrently.
    async fn current_cycle(&self, ticket: FetchTicket) {
        let (station_id, api_key, units, timezone) = {
            let s = self.settings.read();
            (s.station_id.clone(), s.api_key.clone(), s.units, s.timezone)
        };
        let today = dates::station_today(timezone);

        let (current, prior_day, week) = tokio::join!(
            self.api.fetch_current(&station_id, &api_key, units),
            self.metrics.prior_day_precipitation(today),
            self.metrics.current_week_precipitation(today),
        );

        log_failure("current", &current);
        log_failure("prior_day", &prior_day);
        log_failure("week", &week);

        self.store.apply_current(&ticket, current);
        self.store.apply_prior_day(&ticket, prior_day);
        self.store.apply_week(&ticket, week);
    }

    async fn forecast_cycle(&self, ticket: FetchTicket) {
        let (api_key, latitude, longitude, units, language) = {
            let s = self.settings.read();
            (
                s.forecast_key().to_string(),
                s.latitude,
                s.longitude,
                s.units,
                s.language.clone(),
            )
        };

        let forecast = self
            .api
            .fetch_daily_forecast(&api_key, latitude, longitude, units, &language)
            .await;

        log_failure("forecast", &forecast);
        self.store.apply_forecast(&ticket, forecast);
    }

    async fn history(&self, date: NaiveDate, granularity: HistoryGranularity) {
        let ticket = self.store.begin();
        let (station_id, api_key, units) = {
            let s = self.settings.read();
            (s.station_id.clone(), s.api_key.clone(), s.units)
        };

        let history = self
            .api
            .fetch_historical(&station_id, &api_key, date, granularity, units)
            .await;

        log_failure("historical", &history);
        self.store.apply_historical(&ticket, history);
    }
}

fn log_failure<T>(category: &'static str, result: &Result<T, WeatherError>) {
    if let Err(e) = result {
        if e.is_transient() {
            tracing::warn!(category, error = %e, "Refresh failed, retrying on next tick");
        } else {
            tracing::error!(category, error = %e, "Refresh failed");
        }
    }
}

/// One cadence: a cycle on every tick until cancelled.
///
/// The first tick fires immediately, which gives `start()` its initial refresh.
/// Fetches are only begun while `generation` is still the store's active one,
/// so a tick that races `stop()` cannot publish anything.
async fn cadence(
    worker: Worker,
    job: Job,
    period: Duration,
    generation: u64,
    token: CancellationToken,
) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                if !worker.auto_refresh() {
                    tracing::trace!(job = job.name(), "Auto-refresh disabled, skipping tick");
                    continue;
                }
                let Some(ticket) = worker.store.begin_in(generation) else {
                    tracing::debug!(job = job.name(), "Refresh run invalidated");
                    break;
                };
                worker.run(job, ticket).await;
            }
        }
    }

    tracing::debug!(job = job.name(), "Cadence stopped");
}

/// Drives periodic refreshes into a [`StateStore`].
pub struct RefreshScheduler {
    worker: Worker,
    cadence: Cadence,
    run: Mutex<Option<CancellationToken>>,
}

impl RefreshScheduler {
    pub fn new(
        api: Arc<dyn WeatherApi>,
        settings: SharedSettings,
        store: StateStore,
        cadence: Cadence,
    ) -> Self {
        let metrics = MetricsCalculator::new(Arc::clone(&api), Arc::clone(&settings));
        Self {
            worker: Worker {
                api,
                metrics,
                settings,
                store,
            },
            cadence,
            run: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.worker.store
    }

    pub fn state(&self) -> SchedulerState {
        if self.run.lock().is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    /// Arm both cadences, replacing any previous run.
    ///
    /// Each cadence refreshes immediately and then on its period. Ticks are
    /// skipped while auto-refresh is disabled but the timers stay armed.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let token = CancellationToken::new();
        let generation = {
            let mut run = self.run.lock();
            if let Some(previous) = run.replace(token.clone()) {
                tracing::debug!("Restarting refresh scheduler");
                previous.cancel();
                self.worker.store.invalidate();
            }
            self.worker.store.generation()
        };

        tracing::info!(
            current_secs = self.cadence.current.as_secs(),
            forecast_secs = self.cadence.forecast.as_secs(),
            auto_refresh = self.worker.auto_refresh(),
            "Refresh scheduler started"
        );

        tokio::spawn(cadence(
            self.worker.clone(),
            Job::Current,
            self.cadence.current,
            generation,
            token.clone(),
        ));
        tokio::spawn(cadence(
            self.worker.clone(),
            Job::Forecast,
            self.cadence.forecast,
            generation,
            token,
        ));
    }

    /// Disarm both cadences. Results of requests still in flight are dropped.
    pub fn stop(&self) {
        let mut run = self.run.lock();
        if let Some(token) = run.take() {
            token.cancel();
            self.worker.store.invalidate();
            tracing::info!("Refresh scheduler stopped");
        }
    }

    /// Run one current and one forecast cycle now, ignoring the auto-refresh flag.
    pub async fn refresh_now(&self) {
        let store = &self.worker.store;
        tokio::join!(
            self.worker.run(Job::Current, store.begin()),
            self.worker.run(Job::Forecast, store.begin())
        );
    }

    /// Load hourly or daily history for a station-local date into the store.
    pub async fn load_history(&self, date: NaiveDate, granularity: HistoryGranularity) {
        self.worker.history(date, granularity).await;
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Some(token) = self.run.get_mut().take() {
            token.cancel();
        }
    }
}
