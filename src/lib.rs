// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authgate - bearer credential issuance, validation and policy-gated access
//!
//! This crate mints RS256 credentials from a directory of service keys,
//! verifies presented credentials, and gates every request through two
//! declarative policy modules (authentication, then authorization).
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Key store, issuer, validator and access decisions
//! - `policy` - Rule modules and their evaluator
//! - `config` - Environment configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod policy;
pub mod state;
pub mod telemetry;
