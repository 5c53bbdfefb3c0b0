//! Weather-specific error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeatherError {
    /// Missing or placeholder credentials; no request was sent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error: {status} - {body}")]
    Server { status: u16, body: String },

    #[error("Decode error at `{path}`: {cause}")]
    Decode { path: String, cause: String },

    #[error("No data: {0}")]
    NoData(String),
}

impl WeatherError {
    pub fn decode(path: impl Into<String>, cause: impl ToString) -> Self {
        Self::Decode {
            path: path.into(),
            cause: cause.to_string(),
        }
    }

    /// User-friendly error message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration(detail) => {
                format!("Missing configuration: {}. Please check the settings.", detail)
            }
            Self::Network(msg) => format!("Could not reach the weather service: {}", msg),
            Self::Server { status, .. } => {
                format!("Server error or invalid response. Status code: {}", status)
            }
            Self::Decode { path, .. } => {
                format!("Failed to decode weather data (at `{}`).", path)
            }
            Self::NoData(what) => format!("No weather data found: {}", what),
        }
    }

    /// Whether a later poll may succeed without user action.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Server { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for WeatherError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            WeatherError::Network(format!("request timed out: {}", e))
        } else if e.is_connect() {
            WeatherError::Network(format!("connection failed: {}", e))
        } else if let Some(status) = e.status() {
            WeatherError::Server {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else if e.is_decode() {
            WeatherError::decode("<body>", e)
        } else {
            WeatherError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message_contains_status() {
        let err = WeatherError::Server {
            status: 404,
            body: "not found".into(),
        };
        assert!(err.user_message().contains("404"));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_configuration_message_mentions_settings() {
        let err = WeatherError::Configuration("stationId is not configured".into());
        assert!(err.user_message().contains("settings"));
        assert!(err.user_message().contains("stationId"));
    }

    #[test]
    fn test_configuration_message_names_coordinates() {
        let err = WeatherError::Configuration("forecast coordinates are not configured".into());
        let message = err.user_message();
        assert!(message.contains("coordinates"), "{message}");
        assert!(!message.contains("API key"), "{message}");
    }

    #[test]
    fn test_decode_carries_path() {
        let err = WeatherError::decode("observations", "missing field");
        assert!(err.to_string().contains("observations"));
        assert!(err.user_message().contains("observations"));
    }

    #[test]
    fn test_is_transient() {
        assert!(WeatherError::Network("reset".into()).is_transient());
        assert!(WeatherError::Server { status: 503, body: String::new() }.is_transient());
        assert!(!WeatherError::Server { status: 404, body: String::new() }.is_transient());
        assert!(!WeatherError::Configuration("x".into()).is_transient());
        assert!(!WeatherError::decode("x", "y").is_transient());
    }
}
