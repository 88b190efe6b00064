//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub cors_origin: String,
    /// Missing key puts the service in simulated face-verification mode.
    pub gemini_api_key: Option<String>,
    pub face_api_base: String,
    pub face_model: String,
    pub face_confidence_threshold: f64,
    pub geocoder_base_url: String,
    /// How long a check-in or geofence request waits for the browser to
    /// report a device position before failing with LocationUnavailable.
    pub location_wait: Duration,
    pub admin_email: String,
    pub admin_password: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin = std::env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        // --- Load API Keys (as optional) ---
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();

        // --- Load Collaborator Settings ---
        let face_api_base = std::env::var("FACE_API_BASE").unwrap_or_else(|_| {
            "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
        });
        let face_model =
            std::env::var("FACE_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string());

        let threshold_str = std::env::var("FACE_CONFIDENCE_THRESHOLD")
            .unwrap_or_else(|_| geoattend_core::FACE_CONFIDENCE_THRESHOLD.to_string());
        let face_confidence_threshold = threshold_str.parse::<f64>().map_err(|e| {
            ConfigError::InvalidValue("FACE_CONFIDENCE_THRESHOLD".to_string(), e.to_string())
        })?;
        if !(0.0..=1.0).contains(&face_confidence_threshold) {
            return Err(ConfigError::InvalidValue(
                "FACE_CONFIDENCE_THRESHOLD".to_string(),
                format!("'{}' is not in [0, 1]", threshold_str),
            ));
        }

        let geocoder_base_url = std::env::var("GEOCODER_BASE_URL")
            .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string());

        let wait_str = std::env::var("LOCATION_WAIT_SECS").unwrap_or_else(|_| "10".to_string());
        let wait_secs = wait_str.parse::<u64>().map_err(|e| {
            ConfigError::InvalidValue("LOCATION_WAIT_SECS".to_string(), e.to_string())
        })?;
        let location_wait = Duration::from_secs(wait_secs);

        // --- Bootstrap Admin Account ---
        let admin_email = std::env::var("ADMIN_EMAIL")
            .map_err(|_| ConfigError::MissingVar("ADMIN_EMAIL".to_string()))?;
        let admin_password = std::env::var("ADMIN_PASSWORD")
            .map_err(|_| ConfigError::MissingVar("ADMIN_PASSWORD".to_string()))?;

        Ok(Self {
            bind_address,
            log_level,
            cors_origin,
            gemini_api_key,
            face_api_base,
            face_model,
            face_confidence_threshold,
            geocoder_base_url,
            location_wait,
            admin_email,
            admin_password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; these tests must not
    // interleave.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn set_base_env() {
        std::env::set_var("BIND_ADDRESS", "127.0.0.1:0");
        std::env::set_var("RUST_LOG", "INFO");
        std::env::set_var("ADMIN_EMAIL", "admin@example.com");
        std::env::set_var("ADMIN_PASSWORD", "correct horse battery staple");
        std::env::remove_var("FACE_CONFIDENCE_THRESHOLD");
        std::env::remove_var("LOCATION_WAIT_SECS");
    }

    #[test]
    fn loads_with_defaults_when_only_required_vars_are_set() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set_base_env();

        let config = Config::from_env().unwrap();
        assert_eq!(
            config.face_confidence_threshold,
            geoattend_core::FACE_CONFIDENCE_THRESHOLD
        );
        assert_eq!(config.location_wait, Duration::from_secs(10));
        assert_eq!(config.admin_email, "admin@example.com");
    }

    #[test]
    fn out_of_range_confidence_threshold_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set_base_env();
        std::env::set_var("FACE_CONFIDENCE_THRESHOLD", "1.5");

        let err = Config::from_env().unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue(var, _) if var == "FACE_CONFIDENCE_THRESHOLD")
        );

        std::env::remove_var("FACE_CONFIDENCE_THRESHOLD");
    }

    #[test]
    fn non_numeric_confidence_threshold_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set_base_env();
        std::env::set_var("FACE_CONFIDENCE_THRESHOLD", "very confident");

        let err = Config::from_env().unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue(var, _) if var == "FACE_CONFIDENCE_THRESHOLD")
        );

        std::env::remove_var("FACE_CONFIDENCE_THRESHOLD");
    }

    #[test]
    fn non_numeric_location_wait_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set_base_env();
        std::env::set_var("LOCATION_WAIT_SECS", "soon");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "LOCATION_WAIT_SECS"));

        std::env::remove_var("LOCATION_WAIT_SECS");
    }

    #[test]
    fn configured_location_wait_is_parsed_as_seconds() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set_base_env();
        std::env::set_var("LOCATION_WAIT_SECS", "25");

        let config = Config::from_env().unwrap();
        assert_eq!(config.location_wait, Duration::from_secs(25));

        std::env::remove_var("LOCATION_WAIT_SECS");
    }

    #[test]
    fn missing_admin_credentials_are_a_missing_var_error() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set_base_env();
        std::env::remove_var("ADMIN_EMAIL");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(var) if var == "ADMIN_EMAIL"));
    }
}
