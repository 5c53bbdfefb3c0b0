//! Personal weather station polling engine.
//!
//! Fetches current observations, station history and the daily forecast from
//! the Weather Company API on fixed cadences and publishes the results through
//! an observable [`StateStore`].

pub mod client;
pub mod dates;
pub mod decode;
pub mod error;
pub mod metrics;
pub mod scheduler;
pub mod settings;
pub mod store;
pub mod types;

pub use client::{WeatherApi, WeatherClient, DEFAULT_TIMEOUT};
pub use decode::{DecodeReport, Decoded};
pub use error::WeatherError;
pub use metrics::{sum_precipitation, MetricsCalculator};
pub use scheduler::{Cadence, RefreshScheduler, SchedulerState};
pub use settings::{SharedSettings, StationSettings};
pub use store::{CategoryErrors, FetchState, FetchTicket, StateStore};
pub use types::*;
