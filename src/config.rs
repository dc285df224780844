//! Runtime configuration, read from the environment.
//!
//! `config.env` in the working directory is loaded first when present; real
//! environment variables take precedence over it.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `DATABASE_URL` | `sqlite:<path>` for the durable store, `memory` for the in-process one | required |
//! | `DB_MAX_CONNECTIONS` | size of the shared connection pool | `8` |
//! | `DB_BUSY_TIMEOUT_MS` | how long SQLite waits for the write lock | `5000` |
//! | `REQUEST_TIMEOUT_MS` | deadline for every balance store call | none |

use std::time::Duration;

use thiserror::Error;

pub const CONFIG_FILE: &str = "config.env";

const DEFAULT_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    InMemory,
    Sqlite(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend: Backend,
    pub max_connections: u32,
    pub busy_timeout: Duration,
    pub request_timeout: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // a missing file just means everything comes from the environment
        let _ = dotenvy::from_filename(CONFIG_FILE);
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let backend = parse_backend(url.trim())?;

        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(value) => match parse_number("DB_MAX_CONNECTIONS", &value)? {
                0 => {
                    return Err(ConfigError::Invalid {
                        key: "DB_MAX_CONNECTIONS",
                        message: "must be at least 1".to_string(),
                    });
                }
                n => u32::try_from(n).map_err(|_| ConfigError::Invalid {
                    key: "DB_MAX_CONNECTIONS",
                    message: format!("{n} is too large"),
                })?,
            },
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let busy_timeout = lookup("DB_BUSY_TIMEOUT_MS")
            .map(|value| parse_number("DB_BUSY_TIMEOUT_MS", &value).map(Duration::from_millis))
            .transpose()?
            .unwrap_or(DEFAULT_BUSY_TIMEOUT);

        let request_timeout = match lookup("REQUEST_TIMEOUT_MS") {
            Some(value) => match parse_number("REQUEST_TIMEOUT_MS", &value)? {
                0 => {
                    return Err(ConfigError::Invalid {
                        key: "REQUEST_TIMEOUT_MS",
                        message: "must be positive, leave unset for no deadline".to_string(),
                    });
                }
                ms => Some(Duration::from_millis(ms)),
            },
            None => None,
        };

        Ok(Self {
            backend,
            max_connections,
            busy_timeout,
            request_timeout,
        })
    }
}

fn parse_backend(url: &str) -> Result<Backend, ConfigError> {
    if url.eq_ignore_ascii_case("memory") {
        Ok(Backend::InMemory)
    } else if url.starts_with("sqlite:") {
        Ok(Backend::Sqlite(url.to_string()))
    } else {
        Err(ConfigError::Invalid {
            key: "DATABASE_URL",
            message: format!("unsupported database `{url}`, expected `sqlite:<path>` or `memory`"),
        })
    }
}

fn parse_number(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        message: format!("`{value}` is not a non-negative integer"),
    })
}
