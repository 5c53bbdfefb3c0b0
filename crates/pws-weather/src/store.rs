//! Observable fetch state.
//!
//! Consumers subscribe to a `watch` channel and see every state change; only
//! the store's methods mutate it. Each fetch holds a [`FetchTicket`] that
//! records the generation it was started in. Results carried by a ticket of
//! an older generation are dropped, so a `stop()` or restart can never be
//! overwritten by a late response.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::WeatherError;
use crate::types::{DailyForecastEntry, DerivedMetrics, HistoricalObservation, Observation};

/// Last error per data category, as user-facing text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryErrors {
    pub current: Option<String>,
    pub forecast: Option<String>,
    pub historical: Option<String>,
    pub prior_day: Option<String>,
    pub week: Option<String>,
}

impl CategoryErrors {
    fn iter(&self) -> impl Iterator<Item = &str> {
        [
            &self.current,
            &self.forecast,
            &self.historical,
            &self.prior_day,
            &self.week,
        ]
        .into_iter()
        .filter_map(|e| e.as_deref())
    }
}

/// Snapshot of everything fetched so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchState {
    pub current: Option<Observation>,
    pub historical: Vec<HistoricalObservation>,
    pub forecast: Vec<DailyForecastEntry>,
    pub metrics: DerivedMetrics,
    /// True while any fetch of the active generation is running.
    pub loading: bool,
    pub errors: CategoryErrors,
    in_flight: usize,
    generation: u64,
}

impl FetchState {
    /// All category errors joined by newlines, `None` when everything succeeded.
    pub fn error_message(&self) -> Option<String> {
        let messages: Vec<&str> = self.errors.iter().collect();
        if messages.is_empty() {
            None
        } else {
            Some(messages.join("\n"))
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Marks one running fetch. Dropping it ends the fetch for the loading flag.
#[must_use = "dropping the ticket ends the fetch immediately"]
pub struct FetchTicket {
    tx: Arc<watch::Sender<FetchState>>,
    generation: u64,
}

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for FetchTicket {
    fn drop(&mut self) {
        let generation = self.generation;
        self.tx.send_if_modified(|state| {
            if state.generation != generation || state.in_flight == 0 {
                return false;
            }
            state.in_flight -= 1;
            let loading = state.in_flight > 0;
            let changed = state.loading != loading;
            state.loading = loading;
            changed
        });
    }
}

#[derive(Clone)]
pub struct StateStore {
    tx: Arc<watch::Sender<FetchState>>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(FetchState::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> FetchState {
        self.tx.borrow().clone()
    }

    pub fn generation(&self) -> u64 {
        self.tx.borrow().generation
    }

    /// Start a fetch in the current generation and raise the loading flag.
    pub fn begin(&self) -> FetchTicket {
        let mut generation = 0;
        self.tx.send_modify(|state| {
            state.in_flight += 1;
            state.loading = true;
            generation = state.generation;
        });
        FetchTicket {
            tx: Arc::clone(&self.tx),
            generation,
        }
    }

    /// Start a fetch on behalf of a run begun in `generation`.
    ///
    /// Returns `None` once that run has been invalidated; the state is not
    /// touched in that case.
    pub fn begin_in(&self, generation: u64) -> Option<FetchTicket> {
        let started = self.tx.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            state.in_flight += 1;
            state.loading = true;
            true
        });

        started.then(|| FetchTicket {
            tx: Arc::clone(&self.tx),
            generation,
        })
    }

    /// Orphan every running fetch. Their results and tickets become no-ops.
    pub fn invalidate(&self) {
        self.tx.send_modify(|state| {
            state.generation += 1;
            state.in_flight = 0;
            state.loading = false;
        });
    }

    /// Drop all data and errors.
    ///
    /// Teardown: running fetches are orphaned and a running refresh run ends
    /// at its next tick.
    pub fn reset(&self) {
        self.tx.send_modify(|state| {
            *state = FetchState {
                generation: state.generation + 1,
                ..FetchState::default()
            };
        });
    }

    pub fn apply_current(
        &self,
        ticket: &FetchTicket,
        result: Result<Observation, WeatherError>,
    ) -> bool {
        self.apply(ticket, "current", |state| match result {
            Ok(observation) => {
                state.current = Some(observation);
                state.errors.current = None;
            }
            Err(e) => state.errors.current = Some(e.user_message()),
        })
    }

    pub fn apply_historical(
        &self,
        ticket: &FetchTicket,
        result: Result<Vec<HistoricalObservation>, WeatherError>,
    ) -> bool {
        self.apply(ticket, "historical", |state| match result {
            Ok(history) => {
                state.historical = history;
                state.errors.historical = None;
            }
            Err(e) => state.errors.historical = Some(e.user_message()),
        })
    }

    pub fn apply_forecast(
        &self,
        ticket: &FetchTicket,
        result: Result<Vec<DailyForecastEntry>, WeatherError>,
    ) -> bool {
        self.apply(ticket, "forecast", |state| match result {
            Ok(forecast) => {
                state.forecast = forecast;
                state.errors.forecast = None;
            }
            Err(e) => state.errors.forecast = Some(e.user_message()),
        })
    }

    /// Unlike the other categories, a failure clears the previous value.
    pub fn apply_prior_day(
        &self,
        ticket: &FetchTicket,
        result: Result<Option<f64>, WeatherError>,
    ) -> bool {
        self.apply(ticket, "prior_day", |state| match result {
            Ok(total) => {
                state.metrics.prior_day_precipitation = total;
                state.errors.prior_day = None;
            }
            Err(e) => {
                state.metrics.prior_day_precipitation = None;
                state.errors.prior_day = Some(e.user_message());
            }
        })
    }

    /// A failed week sum is reported as unknown, never as zero.
    pub fn apply_week(&self, ticket: &FetchTicket, result: Result<f64, WeatherError>) -> bool {
        self.apply(ticket, "week", |state| match result {
            Ok(total) => {
                state.metrics.week_precipitation = Some(total);
                state.errors.week = None;
            }
            Err(e) => {
                state.metrics.week_precipitation = None;
                state.errors.week = Some(e.user_message());
            }
        })
    }

    fn apply(
        &self,
        ticket: &FetchTicket,
        category: &'static str,
        update: impl FnOnce(&mut FetchState),
    ) -> bool {
        self.tx.send_if_modified(|state| {
            if state.generation != ticket.generation {
                tracing::debug!(
                    category,
                    stale = ticket.generation,
                    active = state.generation,
                    "Discarding result of a stopped refresh"
                );
                return false;
            }
            update(state);
            true
        })
    }
}
