use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use log::info;
use simplelog::LevelFilter;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub database_url: String,
    pub pool_size: u32,
    pub seed: bool,
    pub static_dir: Option<PathBuf>,
    pub log_level: LevelFilter,
}

impl Config {
    /// Reads the process environment, after merging in a `.env` file if present.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let pool_size: u32 = try_load(&lookup, "TRIVIA_POOL_SIZE", "5")?;
        if pool_size == 0 {
            return Err(ConfigError::Invalid {
                key: "TRIVIA_POOL_SIZE",
                value: pool_size.to_string(),
                reason: "pool needs at least one connection".to_owned(),
            });
        }

        Ok(Self {
            bind: try_load(&lookup, "TRIVIA_BIND", "127.0.0.1:8080")?,
            database_url: try_load(&lookup, "DATABASE_URL", "trivia.db")?,
            pool_size,
            seed: try_load(&lookup, "TRIVIA_SEED", "true")?,
            static_dir: lookup("TRIVIA_STATIC_DIR")
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
            log_level: try_load(&lookup, "TRIVIA_LOG_LEVEL", "debug")?,
        })
    }
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_owned()
    });
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}
