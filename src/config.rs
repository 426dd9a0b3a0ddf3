use std::{env, net::SocketAddr};

use dotenv::dotenv;

use crate::error::{KanbanError, Result};

const DEFAULT_POOL_SIZE: u32 = 10;
const DEFAULT_CHANGE_BUFFER: usize = 256;

/// Service settings, read from the environment after loading `.env`.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_url: SocketAddr,
    pub database_url: String,
    pub pool_size: u32,
    /// Capacity of the change-notification broadcast channel.
    pub change_buffer: usize,
    /// When set, a demo board is seeded for this user on startup.
    pub seed_demo_user: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_url = required(&lookup, "APP_URL")?
            .parse()
            .map_err(|err| KanbanError::config(format!("APP_URL is not a socket address: {}", err)))?;
        let database_url = required(&lookup, "DATABASE_URL")?;
        let pool_size = optional(&lookup, "DATABASE_POOL_SIZE", DEFAULT_POOL_SIZE)?;
        let change_buffer = optional(&lookup, "CHANGE_BUFFER", DEFAULT_CHANGE_BUFFER)?;
        let seed_demo_user = lookup("SEED_DEMO_USER").filter(|user| !user.trim().is_empty());

        Ok(Config {
            app_url,
            database_url,
            pool_size,
            change_buffer,
            seed_demo_user,
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or_else(|| KanbanError::config(format!("{} env variable must be set", key)))
}

fn optional<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value
            .parse()
            .map_err(|err| KanbanError::config(format!("{} is invalid: {}", key, err))),
        None => Ok(default),
    }
}
