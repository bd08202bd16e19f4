// src/config.rs

use std::env;
use std::net::SocketAddr;
use dotenvy::dotenv;

use crate::scoring::rows::ClassThresholds;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    /// Prefix of the host's table names (`mdl_quiz_attempts`, ...).
    pub table_prefix: String,
    pub scoreboard: ScoreboardConfig,
}

/// Knobs that shape the report itself rather than the server around it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreboardConfig {
    /// Seconds between two freshness polls of the client.
    pub refresh_interval_secs: u64,
    /// Host session lifetime; polling stops once it would have expired.
    pub session_timeout_secs: u64,
    pub thresholds: ClassThresholds,
    /// Question types graded outside the host (never produce a fraction).
    pub external_qtypes: Vec<String>,
}

impl Default for ScoreboardConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 10,
            session_timeout_secs: 7200,
            thresholds: ClassThresholds::default(),
            external_qtypes: vec!["coderunner".to_string()],
        }
    }
}

impl ScoreboardConfig {
    /// Number of unchanged polls before the client must show the stale notice.
    pub fn max_polls(&self) -> u64 {
        (self.session_timeout_secs / self.refresh_interval_secs.max(1)).max(1)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or("DATABASE_URL must be set")?;

        let jwt_secret = lookup("JWT_SECRET").ok_or("JWT_SECRET must be set")?;

        let rust_log = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| format!("BIND_ADDR is invalid: {}", e))?;

        let table_prefix = lookup("SCOREBOARD_TABLE_PREFIX").unwrap_or_else(|| "mdl_".to_string());
        if !table_prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(format!("SCOREBOARD_TABLE_PREFIX '{}' is not a valid prefix", table_prefix));
        }

        let defaults = ScoreboardConfig::default();

        let refresh_interval_secs = parse_or(&lookup, "SCOREBOARD_REFRESH_SECS", defaults.refresh_interval_secs)?;
        if refresh_interval_secs == 0 {
            return Err("SCOREBOARD_REFRESH_SECS must be positive".to_string());
        }
        let session_timeout_secs =
            parse_or(&lookup, "SCOREBOARD_SESSION_TIMEOUT_SECS", defaults.session_timeout_secs)?;

        let thresholds = ClassThresholds::new(
            parse_or(&lookup, "SCOREBOARD_CORRECT_ABOVE", defaults.thresholds.correct_above)?,
            parse_or(&lookup, "SCOREBOARD_PARTIAL_ABOVE", defaults.thresholds.partial_above)?,
        )?;

        let external_qtypes = match lookup("SCOREBOARD_EXTERNAL_QTYPES") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.external_qtypes,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            table_prefix,
            scoreboard: ScoreboardConfig {
                refresh_interval_secs,
                session_timeout_secs,
                thresholds,
                external_qtypes,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, String>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| format!("{} is invalid: {}", key, e)),
        None => Ok(default),
    }
}
