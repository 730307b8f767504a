use std::{env, fs, path::Path, time::Duration};

use crate::{errors::Error, Result};

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api/v1";
pub const API_URL_ENV: &str = "TF_SYSTEM_API_URL";
pub const API_KEY_ENV: &str = "TF_SYSTEM_API_KEY";

/// Connection settings for the TF System API.
///
/// Explicit values win over the environment; a missing key is a hard error.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub api_url: String,
    pub api_key: String,
    /// `None` leaves the transport default in place.
    pub request_timeout: Option<Duration>,
}

impl ApiConfig {
    pub fn resolve(api_url: Option<String>, api_key: Option<String>) -> Result<Self> {
        let api_url = api_url
            .and_then(non_empty)
            .or_else(|| env_str(API_URL_ENV).and_then(non_empty))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let api_key = api_key
            .and_then(non_empty)
            .or_else(|| env_str(API_KEY_ENV).and_then(non_empty))
            .ok_or_else(|| {
                Error::Config(format!(
                    "API key must be provided or set in {API_KEY_ENV} environment variable"
                ))
            })?;

        let request_timeout = env_u64("TF_SYSTEM_API_TIMEOUT_SECS")
            .filter(|s| *s > 0)
            .map(Duration::from_secs);

        Ok(Self {
            api_url,
            api_key,
            request_timeout,
        })
    }
}

/// Typed configuration for the bot process.
#[derive(Clone, Debug)]
pub struct Config {
    pub api: ApiConfig,

    // Acting identity for the console adapter
    pub actor_id: String,
    pub actor_rank: Option<String>,

    // Chat limits
    pub message_limit: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let api = ApiConfig::resolve(None, None)?;

        let actor_id = env_str("TF_ACTOR_ID")
            .and_then(non_empty)
            .unwrap_or_else(|| "console".to_string());
        let actor_rank = env_str("TF_ACTOR_RANK").and_then(non_empty);

        let message_limit = env_usize("DISCORD_MESSAGE_LIMIT").unwrap_or(2000).max(200);

        Ok(Self {
            api,
            actor_id,
            actor_rank,
            message_limit,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
