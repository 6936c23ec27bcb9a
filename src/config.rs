//! Server configuration from the environment.
//!
//! Every knob has a default; only a value that is present but unparseable is
//! an error. `main` loads `.env` before calling [`ServerConfig::from_env`].

use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CLIENT_CHANNEL_CAPACITY: usize = 256;
pub const DEFAULT_BOARD_ID: &str = "default";
pub const DEFAULT_ROOM_SWEEP_INTERVAL_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Outbound queue depth per connected client.
    pub client_channel_capacity: usize,
    /// Board a join lands on when it names none.
    pub default_board_id: String,
    /// Evict rooms without subscribers after this long. `None` keeps rooms
    /// for the process lifetime.
    pub room_idle_ttl: Option<Duration>,
    pub room_sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            client_channel_capacity: DEFAULT_CLIENT_CHANNEL_CAPACITY,
            default_board_id: DEFAULT_BOARD_ID.to_owned(),
            room_idle_ttl: None,
            room_sweep_interval: Duration::from_secs(DEFAULT_ROOM_SWEEP_INTERVAL_SECS),
        }
    }
}

impl ServerConfig {
    /// Read configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which returns a variable's value
    /// if set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a numeric variable does not parse,
    /// or if the channel capacity or sweep interval is zero.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = env_parse(&lookup, "PORT", DEFAULT_PORT)?;
        let client_channel_capacity =
            non_zero(&lookup, "CLIENT_CHANNEL_CAPACITY", DEFAULT_CLIENT_CHANNEL_CAPACITY)?;
        let default_board_id = lookup("DEFAULT_BOARD_ID")
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BOARD_ID.to_owned());
        let room_idle_ttl = match lookup("ROOM_IDLE_TTL_SECS") {
            Some(raw) if !raw.trim().is_empty() => Some(Duration::from_secs(parse("ROOM_IDLE_TTL_SECS", &raw)?)),
            _ => None,
        };
        let room_sweep_interval = Duration::from_secs(non_zero(
            &lookup,
            "ROOM_SWEEP_INTERVAL_SECS",
            DEFAULT_ROOM_SWEEP_INTERVAL_SECS,
        )?);

        Ok(Self { port, client_channel_capacity, default_board_id, room_idle_ttl, room_sweep_interval })
    }
}

fn env_parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => parse(key, &raw),
        _ => Ok(default),
    }
}

fn non_zero<T: FromStr + Default + PartialEq>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    let value = env_parse(lookup, key, default)?;
    if value == T::default() {
        return Err(ConfigError::Invalid { key, value: "0".to_owned() });
    }
    Ok(value)
}

fn parse<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value: raw.to_owned() })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
