// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Startup errors.
//!
//! Anything that stops the server or the admin tool before it can serve.
//! Per-request failures are [`AuthError`](crate::auth::AuthError) instead.

use crate::auth::{IssueError, KeyStoreError};
use crate::config::ConfigError;
use crate::policy::PolicyError;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("key store: {0}")]
    Keys(#[from] KeyStoreError),

    #[error("policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("issuing credential: {0}")]
    Issue(#[from] IssueError),

    #[error("active key {0:?} is not loaded")]
    MissingActiveKey(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl StartupError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
