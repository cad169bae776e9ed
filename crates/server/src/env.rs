// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the server binary.
//!
//! Every recognized key lives in the `GANTRY_` namespace. The assembled
//! [`Config`] is injected where needed; nothing here is a global.

use gantry_core::trim;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const ENV_PREFIX: &str = "GANTRY_";

fn get(name: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, name)).ok().and_then(|v| trim(&v))
}

fn get_bool(name: &str) -> Option<bool> {
    get(name).map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
}

fn get_usize(name: &str) -> Option<usize> {
    get(name).and_then(|v| v.parse().ok())
}

fn get_millis(name: &str) -> Option<Duration> {
    get(name).and_then(|v| v.parse().ok()).map(Duration::from_millis)
}

/// `GANTRY_DEBUG`: verbose logging, in-memory store default.
pub fn debug() -> bool {
    get_bool("DEBUG").unwrap_or(false)
}

/// `GANTRY_LOG_LEVEL`: tracing filter; debug when DEBUG, info otherwise.
pub fn log_level() -> String {
    get("LOG_LEVEL").unwrap_or_else(|| {
        if debug() {
            "debug".to_string()
        } else {
            "info".to_string()
        }
    })
}

/// `GANTRY_DATABASE_URI`: connection string.
pub fn database_uri() -> String {
    get("DATABASE_URI").unwrap_or_else(|| "sqlite::memory:".to_string())
}

/// `GANTRY_DATABASE_TABLE`: name of the persisted table.
pub fn database_table() -> String {
    get("DATABASE_TABLE").unwrap_or_else(|| "gantry_data".to_string())
}

/// `GANTRY_SCHEDULER_PROCESS_COUNT`: worker threads per server (default 4).
pub fn scheduler_process_count() -> usize {
    get_usize("SCHEDULER_PROCESS_COUNT").unwrap_or(4)
}

/// `GANTRY_SCHEDULER_TICK_MS`: scheduler tick interval (default 1000 ms).
pub fn scheduler_tick() -> Duration {
    get_millis("SCHEDULER_TICK_MS").unwrap_or(gantry_engine::SCHEDULER_TICK)
}

/// `GANTRY_QUEUE_CAPACITY`: in-process queue capacity (default 256).
pub fn queue_capacity() -> usize {
    get_usize("QUEUE_CAPACITY").unwrap_or(gantry_engine::DEFAULT_QUEUE_CAPACITY)
}

/// `GANTRY_ADMIN_DEFAULT_USERNAME`: bootstrap system username.
pub fn admin_default_username() -> String {
    get("ADMIN_DEFAULT_USERNAME").unwrap_or_else(|| "admin".to_string())
}

/// `GANTRY_ADMIN_DEFAULT_PASSWORD`: bootstrap system password.
pub fn admin_default_password() -> String {
    get("ADMIN_DEFAULT_PASSWORD").unwrap_or_else(|| "password".to_string())
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GANTRY_SERVER_TYPE must be 'web' or 'scheduler', got {0:?}")]
    InvalidServerType(String),
    #[error("GANTRY_SERVER_TYPE is not set")]
    MissingServerType,
}

/// Which loops this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerType {
    /// Data-service side only; the HTTP surface is hosted elsewhere.
    Web,
    /// Scheduler, workers, heartbeats, recovery.
    Scheduler,
}

impl std::str::FromStr for ServerType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "web" => Ok(ServerType::Web),
            "scheduler" => Ok(ServerType::Scheduler),
            other => Err(ConfigError::InvalidServerType(other.to_string())),
        }
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServerType::Web => "web",
            ServerType::Scheduler => "scheduler",
        })
    }
}

/// Assembled process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub debug: bool,
    pub log_level: String,
    pub database_uri: String,
    pub database_table: String,
    pub server_type: ServerType,
    pub worker_count: usize,
    pub scheduler_tick: Duration,
    pub queue_capacity: usize,
    pub admin_username: String,
    pub admin_password: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_type = match get("SERVER_TYPE") {
            Some(value) => value.parse()?,
            None => return Err(ConfigError::MissingServerType),
        };
        Ok(Self {
            debug: debug(),
            log_level: log_level(),
            database_uri: database_uri(),
            database_table: database_table(),
            server_type,
            worker_count: scheduler_process_count(),
            scheduler_tick: scheduler_tick(),
            queue_capacity: queue_capacity(),
            admin_username: admin_default_username(),
            admin_password: admin_default_password(),
        })
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
