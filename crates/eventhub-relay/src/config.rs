//! Runtime configuration, read from the environment (and `.env`).
//!
//! | variable           | default         |
//! |--------------------|-----------------|
//! | `JWT_SECRET`       | required        |
//! | `BIND_ADDR`        | `0.0.0.0:5002`  |
//! | `DATABASE_PATH`    | `eventhub.db`   |
//! | `DEFAULT_ADMIN_ID` | `1`             |

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

use eventhub_core::UserId;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5002";
const DEFAULT_DATABASE_PATH: &str = "eventhub.db";
const DEFAULT_ADMIN_ID: UserId = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub default_admin_id: UserId,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = get("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let bind = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind
            .parse()
            .map_err(|_| ConfigError::Invalid { name: "BIND_ADDR", value: bind })?;

        let database_path = get("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));

        let default_admin_id = match get("DEFAULT_ADMIN_ID") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::Invalid { name: "DEFAULT_ADMIN_ID", value: v })?,
            None => DEFAULT_ADMIN_ID,
        };

        Ok(Self { jwt_secret, bind_addr, database_path, default_admin_id })
    }
}
