//! Service configuration, read once from the environment at start-up

use crate::llm::{all_models, find_model, DEFAULT_MODEL};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;
const DEFAULT_MAX_SESSIONS: usize = 1000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
    #[error("Unknown model {model:?}, expected one of: {known}")]
    UnknownModel { model: String, known: String },
    #[error("Cannot read system prompt {path}: {source}")]
    PromptFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("System prompt file {0} is empty")]
    EmptyPrompt(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Gemini credential; only ever read server-side
    pub api_key: Option<String>,
    pub model: String,
    pub port: u16,
    /// Replaces the built-in system instruction
    pub system_prompt_path: Option<PathBuf>,
    pub web_search: bool,
    pub request_timeout: Duration,
    /// Upper bound on reply length sent as `maxOutputTokens`
    pub max_output_tokens: Option<u32>,
    /// Sessions untouched for this long are dropped
    pub session_idle_timeout: Duration,
    /// Hard cap on live sessions; the least recently active one is evicted
    pub max_sessions: usize,
    /// Base URL replacing the public Gemini endpoint
    pub gateway: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            port: DEFAULT_PORT,
            system_prompt_path: None,
            web_search: true,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_output_tokens: None,
            session_idle_timeout: Duration::from_secs(DEFAULT_SESSION_IDLE_SECS),
            max_sessions: DEFAULT_MAX_SESSIONS,
            gateway: None,
        }
    }
}

impl ChatConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let model = get("KARBO_MODEL").unwrap_or(defaults.model);
        if find_model(&model).is_none() {
            let known = all_models()
                .iter()
                .map(|m| m.id)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ConfigError::UnknownModel { model, known });
        }

        let port = match get("KARBO_PORT") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    var: "KARBO_PORT",
                    value,
                })?,
            None => defaults.port,
        };

        let web_search = match get("KARBO_WEB_SEARCH") {
            Some(value) => parse_flag(&value).ok_or(ConfigError::InvalidValue {
                var: "KARBO_WEB_SEARCH",
                value,
            })?,
            None => defaults.web_search,
        };

        let request_timeout = match get("KARBO_REQUEST_TIMEOUT_SECS") {
            Some(value) => {
                Duration::from_secs(parse_positive("KARBO_REQUEST_TIMEOUT_SECS", value)?)
            }
            None => defaults.request_timeout,
        };

        let max_output_tokens = get("KARBO_MAX_OUTPUT_TOKENS")
            .map(|value| parse_positive("KARBO_MAX_OUTPUT_TOKENS", value))
            .transpose()?;

        let session_idle_timeout = match get("KARBO_SESSION_IDLE_SECS") {
            Some(value) => Duration::from_secs(parse_positive("KARBO_SESSION_IDLE_SECS", value)?),
            None => defaults.session_idle_timeout,
        };

        let max_sessions = match get("KARBO_MAX_SESSIONS") {
            Some(value) => parse_positive("KARBO_MAX_SESSIONS", value)?,
            None => defaults.max_sessions,
        };

        Ok(Self {
            api_key: get("GEMINI_API_KEY"),
            model,
            port,
            system_prompt_path: get("KARBO_SYSTEM_PROMPT").map(PathBuf::from),
            web_search,
            request_timeout,
            max_output_tokens,
            session_idle_timeout,
            max_sessions,
            gateway: get("LLM_GATEWAY"),
        })
    }
}

/// Parse a non-zero integer
fn parse_positive<T>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr + Default + PartialEq,
{
    match value.trim().parse::<T>() {
        Ok(n) if n != T::default() => Ok(n),
        _ => Err(ConfigError::InvalidValue { var, value }),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
