// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use serde::Serialize;

use crate::auth::metrics::DecisionCounts;
use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Key ids available for verification
    pub keys: Vec<String>,
    /// Decisions made since startup
    pub decisions: DecisionCounts,
}

/// Liveness plus a summary of loaded keys and decision counters.
///
/// Keys and policies are loaded before the listener opens, so a running
/// process is always ready.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        keys: state
            .access
            .keys()
            .kids()
            .into_iter()
            .map(str::to_string)
            .collect(),
        decisions: state.decisions.snapshot(),
    })
}
