use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_LIVE_MODEL: &str = "gemini-2.5-flash-native-audio-preview-12-2025";
pub const DEFAULT_VOICE: &str = "Kore";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub gemini_api_key: String,
    pub live_model: String,
    /// Overrides the Live API WebSocket endpoint.
    pub live_endpoint: Option<String>,
    /// Global default voice, used when neither the client nor a persona picks one.
    pub default_voice: String,
    /// Fixed language for practice sessions.
    pub language_code: String,
    pub crm_webhook_url: Option<String>,
    pub prompts_path: PathBuf,
    pub log_level: Level,
    pub config_timeout: Duration,
    pub summary_grace: Duration,
    pub drain_timeout: Duration,
    pub max_sessions: usize,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:8080");
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;

        let live_model = var_or("LIVE_MODEL", DEFAULT_LIVE_MODEL);
        let live_endpoint = std::env::var("LIVE_ENDPOINT")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let default_voice = var_or("COACH_VOICE", DEFAULT_VOICE);
        let language_code = var_or("LANGUAGE_CODE", "en-US");
        let crm_webhook_url = std::env::var("CRM_WEBHOOK_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = PathBuf::from(var_or("PROMPTS_PATH", "./prompts"));

        let config_timeout = Duration::from_secs(parse_var("CONFIG_TIMEOUT_SECS", 30)?);
        let summary_grace = Duration::from_secs(parse_var("SUMMARY_GRACE_SECS", 5)?);
        let drain_timeout = Duration::from_secs(parse_var("DRAIN_TIMEOUT_SECS", 10)?);

        let max_sessions = parse_var("MAX_SESSIONS", 256usize)?;
        if max_sessions == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_SESSIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            gemini_api_key,
            live_model,
            live_endpoint,
            default_voice,
            language_code,
            crm_webhook_url,
            prompts_path,
            log_level,
            config_timeout,
            summary_grace,
            drain_timeout,
            max_sessions,
        })
    }

    /// A configuration with the built-in defaults and a placeholder key.
    pub fn with_defaults() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            gemini_api_key: String::new(),
            live_model: DEFAULT_LIVE_MODEL.to_string(),
            live_endpoint: None,
            default_voice: DEFAULT_VOICE.to_string(),
            language_code: "en-US".to_string(),
            crm_webhook_url: None,
            prompts_path: PathBuf::from("./prompts"),
            log_level: Level::INFO,
            config_timeout: Duration::from_secs(30),
            summary_grace: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(10),
            max_sessions: 256,
        }
    }
}
