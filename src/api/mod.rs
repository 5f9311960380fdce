// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{auth::middleware::authenticate, state::AppState};

pub mod health;
pub mod test;

pub fn router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/me", get(test::me))
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    let v1_routes = Router::new()
        .route("/test", get(test::public))
        .route("/test/auth", get(test::admin))
        .merge(authenticated);

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", v1_routes)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::permissive()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AccessControl, FixedClock, KeyStore};
    use crate::policy::PolicyEngine;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let keys = Arc::new(
            KeyStore::from_pem_entries([(
                "private",
                include_str!("../../tests/fixtures/keys/private.pem"),
            )])
            .unwrap(),
        );
        let access = AccessControl::new(
            keys,
            Arc::new(PolicyEngine::embedded().unwrap()),
            Arc::new(FixedClock::at_secs(0)),
        );
        router(AppState::new(access))
    }

    async fn get(uri: &str) -> axum::response::Response {
        app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn routes_are_mounted_under_v1() {
        assert_eq!(get("/v1/test").await.status(), StatusCode::OK);
        assert_eq!(get("/health").await.status(), StatusCode::OK);
        assert_eq!(get("/test").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(get("/v1/me").await.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn responses_carry_a_request_id() {
        let response = get("/v1/test").await;
        assert!(response.headers().contains_key("x-request-id"));
    }
}
