// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Test endpoints, one per access level.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::auth::{AdminOnly, Auth, AuthError, Claims};
use crate::policy::AuthzRule;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// `GET /v1/test` - no credential required.
pub async fn public() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "OK".to_string(),
    })
}

/// `GET /v1/test/auth` - ADMIN only.
pub async fn admin(AdminOnly(claims): AdminOnly) -> Json<StatusResponse> {
    tracing::debug!(sub = %claims.sub, "Admin test route served");
    Json(StatusResponse {
        status: "OK".to_string(),
    })
}

/// `GET /v1/me` - any authenticated role; echoes the caller's claims.
pub async fn me(
    State(state): State<AppState>,
    Auth(claims): Auth,
) -> Result<Json<Claims>, AuthError> {
    state
        .access
        .authorize(&state.eval_context(), &claims, AuthzRule::Any)?;
    Ok(Json(claims))
}
