// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the [`AppConfig`] loaded from
//! them at startup. An invalid value is a startup error, never a silent
//! fallback. Variables marked *admin* are read by `authgate-admin` only;
//! the server verifies credentials but never mints them.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `KEYS_DIR` | Directory of PEM private keys, one per `kid` | `keys` |
//! | `ACTIVE_KID` | Key that must be loaded; signing key of the admin tool | `private` |
//! | `AUTH_ISSUER` | *admin*: issuer written into new credentials | `service project` |
//! | `AUTH_AUDIENCE` | Required `aud` claim | Optional |
//! | `TOKEN_TTL_SECS` | *admin*: lifetime of new credentials | `3600` |
//! | `POLICY_TIMEOUT_MS` | Upper bound on one policy evaluation | `250` |
//! | `SHUTDOWN_TIMEOUT_SECS` | Grace period for in-flight requests | `10` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the key directory.
///
/// Every `*.pem` file in the directory is loaded; the file stem is the key
/// id (`kid`) written into credential headers.
pub const KEYS_DIR_ENV: &str = "KEYS_DIR";

pub const ACTIVE_KID_ENV: &str = "ACTIVE_KID";
pub const AUTH_ISSUER_ENV: &str = "AUTH_ISSUER";
pub const AUTH_AUDIENCE_ENV: &str = "AUTH_AUDIENCE";
pub const TOKEN_TTL_SECS_ENV: &str = "TOKEN_TTL_SECS";

/// Environment variable name for the per-evaluation policy deadline.
///
/// `0` disables the deadline.
pub const POLICY_TIMEOUT_MS_ENV: &str = "POLICY_TIMEOUT_MS";

pub const SHUTDOWN_TIMEOUT_SECS_ENV: &str = "SHUTDOWN_TIMEOUT_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_KEYS_DIR: &str = "keys";
pub const DEFAULT_ACTIVE_KID: &str = "private";
pub const DEFAULT_ISSUER: &str = "service project";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;
pub const DEFAULT_POLICY_TIMEOUT_MS: u64 = 250;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name}={value:?} is invalid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected 'json' or 'pretty', got {other:?}")),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub keys_dir: PathBuf,
    pub active_kid: String,
    pub audience: Option<String>,
    pub policy_timeout: Option<Duration>,
    pub shutdown_timeout: Duration,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port: u16 = parse(&lookup, PORT_ENV, DEFAULT_PORT)?;
        let bind = format!("{host}:{port}")
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: HOST_ENV,
                value: host.clone(),
                reason: e.to_string(),
            })?;

        let policy_timeout_ms: u64 =
            parse(&lookup, POLICY_TIMEOUT_MS_ENV, DEFAULT_POLICY_TIMEOUT_MS)?;
        let shutdown_secs: u64 =
            parse(&lookup, SHUTDOWN_TIMEOUT_SECS_ENV, DEFAULT_SHUTDOWN_TIMEOUT_SECS)?;

        Ok(Self {
            bind,
            keys_dir: var(KEYS_DIR_ENV)
                .unwrap_or_else(|| DEFAULT_KEYS_DIR.to_string())
                .into(),
            active_kid: var(ACTIVE_KID_ENV).unwrap_or_else(|| DEFAULT_ACTIVE_KID.to_string()),
            audience: var(AUTH_AUDIENCE_ENV),
            policy_timeout: (policy_timeout_ms > 0)
                .then(|| Duration::from_millis(policy_timeout_ms)),
            shutdown_timeout: Duration::from_secs(shutdown_secs),
            log_format: parse(&lookup, LOG_FORMAT_ENV, LogFormat::default())?,
        })
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name).filter(|v| !v.trim().is_empty()) {
        None => Ok(default),
        Some(value) => match value.trim().parse() {
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(ConfigError::Invalid {
                name,
                reason: e.to_string(),
                value,
            }),
        },
    }
}
