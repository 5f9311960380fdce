// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP status mapping of access decisions.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, Request, StatusCode},
    Router,
};
use tower::ServiceExt;

use authgate::api::router;
use authgate::auth::{AccessControl, FixedClock, KeyStore, Role};
use authgate::policy::PolicyEngine;
use authgate::state::AppState;

const PRIMARY: &str = include_str!("fixtures/keys/private.pem");
const SECONDARY: &str = include_str!("fixtures/keys/secondary.pem");

struct Harness {
    app: Router,
    state: AppState,
}

impl Harness {
    fn new() -> Self {
        let keys = Arc::new(
            KeyStore::from_pem_entries([("private", PRIMARY), ("secondary", SECONDARY)]).unwrap(),
        );
        let access = AccessControl::new(
            keys,
            Arc::new(PolicyEngine::embedded().unwrap()),
            Arc::new(FixedClock::at_secs(1_700_000_000)),
        );
        let state = AppState::new(access).with_policy_timeout(Duration::from_secs(5));
        Self {
            app: router(state.clone()),
            state,
        }
    }

    fn token(&self, sub: &str, roles: &[Role]) -> String {
        self.state
            .access
            .issuer()
            .issue("private", sub, "service project", roles, Duration::from_secs(3600))
            .unwrap()
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder().uri(uri);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = self
            .app
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }
}

#[tokio::test]
async fn public_routes_need_no_credential() {
    let h = Harness::new();
    let (status, body) = h.get("/v1/test", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");

    let (status, body) = h.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["keys"], serde_json::json!(["private", "secondary"]));
}

#[tokio::test]
async fn missing_or_bad_credentials_are_401() {
    let h = Harness::new();

    let (status, body) = h.get("/v1/test/auth", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "missing_auth_header");

    let (status, body) = h.get("/v1/test/auth", Some("abc")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "not authenticated");

    let (status, _) = h.get("/v1/me", Some("abc.def.ghi")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn user_on_admin_route_is_403() {
    let h = Harness::new();
    let token = h.token("u1", &[Role::User]);
    let (status, body) = h.get("/v1/test/auth", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error_code"], "forbidden");
}

#[tokio::test]
async fn admin_on_admin_route_is_200() {
    let h = Harness::new();
    let token = h.token("u1", &[Role::Admin]);
    let (status, body) = h.get("/v1/test/auth", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
}

#[tokio::test]
async fn me_returns_claims_and_counts_decisions() {
    let h = Harness::new();
    let token = h.token("u7", &[Role::User]);
    let (status, body) = h.get("/v1/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sub"], "u7");
    assert_eq!(body["roles"], serde_json::json!(["USER"]));

    let (_, _) = h.get("/v1/me", None).await;
    let counts = h.state.decisions.snapshot();
    assert_eq!(counts.authn_allowed, 1);
    assert_eq!(counts.authz_allowed, 1);
}

#[tokio::test]
async fn credential_without_roles_is_403_on_me() {
    let h = Harness::new();
    let token = h.token("u1", &[]);
    let (status, _) = h.get("/v1/me", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn shutdown_cancels_pending_decisions() {
    let h = Harness::new();
    let token = h.token("u1", &[Role::Admin]);
    h.state.shutdown.cancel();
    let (status, body) = h.get("/v1/test/auth", Some(&token)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error_code"], "cancelled");
}
