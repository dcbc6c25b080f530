use pitchperfect_core::{
    llm_client::{GEMINI_API_BASE, HistoryShape, OPENAI_API_BASE},
    speech::{DEFAULT_TTS_MODEL, ELEVENLABS_API_BASE},
};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported text-generation backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAI,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Gemini => write!(f, "gemini"),
            Provider::OpenAI => write!(f, "openai"),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub provider: Provider,
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub chat_model: String,
    pub gemini_api_base: String,
    pub openai_api_base: String,
    pub history_shape: HistoryShape,
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_voice_id: Option<String>,
    pub elevenlabs_model: String,
    pub elevenlabs_api_base: String,
    pub upstream_timeout: Duration,
    /// Idle time after which a server-held session is evicted.
    pub session_ttl: Duration,
    pub log_level: Level,
}

// Keys are reported by presence only.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("provider", &self.provider)
            .field("google_api_key", &self.google_api_key.is_some())
            .field("openai_api_key", &self.openai_api_key.is_some())
            .field("chat_model", &self.chat_model)
            .field("history_shape", &self.history_shape)
            .field("elevenlabs_api_key", &self.elevenlabs_api_key.is_some())
            .field("elevenlabs_voice_id", &self.elevenlabs_voice_id.is_some())
            .field("elevenlabs_model", &self.elevenlabs_model)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("session_ttl", &self.session_ttl)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn positive_secs(name: &str, default: u64) -> Result<Duration, ConfigError> {
    let value = std::env::var(name).unwrap_or_else(|_| default.to_string());
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not a positive number of seconds", value),
        )),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let provider_str =
            std::env::var("COMPLETION_PROVIDER").unwrap_or_else(|_| "gemini".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "gemini" => Provider::Gemini,
            "openai" => Provider::OpenAI,
            other => {
                return Err(ConfigError::InvalidValue(
                    "COMPLETION_PROVIDER".to_string(),
                    format!("'{}' is not one of 'gemini' or 'openai'", other),
                ));
            }
        };

        let google_api_key = non_empty_var("GOOGLE_API_KEY").or_else(|| non_empty_var("GEMINI_API_KEY"));
        let openai_api_key = non_empty_var("OPENAI_API_KEY");

        let default_model = match provider {
            Provider::Gemini => "gemini-1.5-flash",
            Provider::OpenAI => "gpt-4o",
        };
        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| default_model.to_string());

        let gemini_api_base =
            std::env::var("GEMINI_API_BASE").unwrap_or_else(|_| GEMINI_API_BASE.to_string());
        let openai_api_base =
            std::env::var("OPENAI_API_BASE").unwrap_or_else(|_| OPENAI_API_BASE.to_string());

        let history_shape = match std::env::var("HISTORY_SHAPE") {
            Ok(value) => value
                .parse::<HistoryShape>()
                .map_err(|e| ConfigError::InvalidValue("HISTORY_SHAPE".to_string(), e))?,
            Err(_) => HistoryShape::default(),
        };

        let elevenlabs_api_key = non_empty_var("ELEVENLABS_API_KEY");
        let elevenlabs_voice_id = non_empty_var("ELEVENLABS_VOICE_ID");
        let elevenlabs_model =
            std::env::var("ELEVENLABS_MODEL").unwrap_or_else(|_| DEFAULT_TTS_MODEL.to_string());
        let elevenlabs_api_base = std::env::var("ELEVENLABS_API_BASE")
            .unwrap_or_else(|_| ELEVENLABS_API_BASE.to_string());

        let upstream_timeout = positive_secs("UPSTREAM_TIMEOUT_SECS", 30)?;
        let session_ttl = positive_secs("SESSION_TTL_SECS", 1800)?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        match provider {
            Provider::Gemini => {
                if google_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "GOOGLE_API_KEY must be set for 'gemini' provider".to_string(),
                    ));
                }
            }
            Provider::OpenAI => {
                if openai_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                    ));
                }
            }
        }

        Ok(Self {
            bind_address,
            provider,
            google_api_key,
            openai_api_key,
            chat_model,
            gemini_api_base,
            openai_api_base,
            history_shape,
            elevenlabs_api_key,
            elevenlabs_voice_id,
            elevenlabs_model,
            elevenlabs_api_base,
            upstream_timeout,
            session_ttl,
            log_level,
        })
    }

    /// Speech synthesis is enabled only when both the key and the voice are set.
    pub fn speech_enabled(&self) -> bool {
        self.elevenlabs_api_key.is_some() && self.elevenlabs_voice_id.is_some()
    }
}
