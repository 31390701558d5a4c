use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, ensure, Context, Result};

use crate::runtime::{ResolveOptions, ToolFailurePolicy, DEFAULT_DEADLINE, DEFAULT_POLL_INTERVAL};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_WEBHOOK_URL: &str = "https://hook.us2.make.com/349qjcw5disoaprcutnjy0vyon0g73zg";

/// Process configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: String,
    pub assistant_id: String,
    /// Bearer token accepted on `/chat`.
    pub access_token: String,
    pub port: u16,
    pub webhook_url: String,
    pub run: ResolveOptions,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{key} must be set in the environment or .env"))
        };

        let port = parse_or(&lookup, "PORT", DEFAULT_PORT)?;
        let deadline_ms = parse_or(&lookup, "RUN_DEADLINE_MS", DEFAULT_DEADLINE.as_millis() as u64)?;
        let interval_ms = parse_or(&lookup, "RUN_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL.as_millis() as u64)?;
        ensure!(interval_ms > 0, "RUN_POLL_INTERVAL_MS must be greater than zero");
        let on_tool_failure = match lookup("TOOL_FAILURE_POLICY") {
            Some(raw) => raw.parse::<ToolFailurePolicy>().map_err(|e| anyhow!(e))?,
            None => ToolFailurePolicy::default(),
        };

        Ok(Self {
            openai_api_key: required("OPENAI_API_KEY")?,
            assistant_id: required("ASSISTANT_ID")?,
            access_token: required("VALID_TOKEN")?,
            port,
            webhook_url: lookup("WEBHOOK_URL").unwrap_or_else(|| DEFAULT_WEBHOOK_URL.to_string()),
            run: ResolveOptions {
                deadline: Duration::from_millis(deadline_ms),
                poll_interval: Duration::from_millis(interval_ms),
                on_tool_failure,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
