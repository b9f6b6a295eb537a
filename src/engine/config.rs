// SPDX-License-Identifier: MIT

//! Environment-driven configuration for the server and the worker

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::common::{CalcError, Result};
use crate::engine::model::Operator;

pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATABASE: &str = "store.db";
pub const DEFAULT_OPERATION_TIME_MS: u64 = 1000;
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 300;
pub const DEFAULT_ORCHESTRATOR_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

const DEV_JWT_SECRET: &str = "calc-orchestrator-dev-secret";

/// Parse `key` from `lookup`, falling back to `default` when unset or unparsable
fn env_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                log::warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
                default
            }
        },
    }
}

/// Simulated cost per operator, handed to workers with each task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationTimes {
    pub addition_ms: u64,
    pub subtraction_ms: u64,
    pub multiplication_ms: u64,
    pub division_ms: u64,
}

impl OperationTimes {
    pub fn for_operator(&self, op: Operator) -> u64 {
        match op {
            Operator::Add => self.addition_ms,
            Operator::Subtract => self.subtraction_ms,
            Operator::Multiply => self.multiplication_ms,
            Operator::Divide => self.division_ms,
        }
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        Self {
            addition_ms: env_or(&lookup, "TIME_ADDITION_MS", DEFAULT_OPERATION_TIME_MS),
            subtraction_ms: env_or(&lookup, "TIME_SUBTRACTION_MS", DEFAULT_OPERATION_TIME_MS),
            multiplication_ms: env_or(
                &lookup,
                "TIME_MULTIPLICATIONS_MS",
                DEFAULT_OPERATION_TIME_MS,
            ),
            division_ms: env_or(&lookup, "TIME_DIVISIONS_MS", DEFAULT_OPERATION_TIME_MS),
        }
    }
}

impl Default for OperationTimes {
    fn default() -> Self {
        Self {
            addition_ms: DEFAULT_OPERATION_TIME_MS,
            subtraction_ms: DEFAULT_OPERATION_TIME_MS,
            multiplication_ms: DEFAULT_OPERATION_TIME_MS,
            division_ms: DEFAULT_OPERATION_TIME_MS,
        }
    }
}

/// Orchestrator server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub database: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub operation_times: OperationTimes,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            log::warn!("JWT_SECRET not set, using the built-in development secret");
            DEV_JWT_SECRET.to_string()
        });

        Self {
            host: env_or(&lookup, "HOST", DEFAULT_HOST),
            port: env_or(&lookup, "PORT", DEFAULT_PORT),
            database: lookup("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE)),
            jwt_secret,
            token_ttl_secs: env_or(&lookup, "TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS),
            operation_times: OperationTimes::from_lookup(&lookup),
        }
    }
}

/// Worker pool settings
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub orchestrator_url: url::Url,
    /// Number of concurrent polling loops
    pub computing_power: usize,
    pub poll_interval_ms: u64,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self> {
        let raw_url =
            lookup("ORCHESTRATOR_URL").unwrap_or_else(|| DEFAULT_ORCHESTRATOR_URL.to_string());
        Ok(Self {
            orchestrator_url: parse_url(&raw_url)?,
            computing_power: env_or(&lookup, "COMPUTING_POWER", 1usize).max(1),
            poll_interval_ms: env_or(&lookup, "POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS),
        })
    }
}

pub fn parse_url(raw: &str) -> Result<url::Url> {
    url::Url::parse(raw)
        .map_err(|e| CalcError::config(format!("invalid orchestrator URL {:?}: {}", raw, e)))
}
