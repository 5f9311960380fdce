// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error};

use crate::policy::{AuthzRule, PolicyError};

/// Why a presented credential was rejected by the validator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    /// Not a three-part token, or the header cannot be decoded
    #[error("token is malformed")]
    TokenMalformed,

    /// Algorithm not allowed, or signature does not verify
    #[error("token signature is invalid")]
    SignatureInvalid,

    /// The `kid` in the header is unknown to the key store
    #[error("signing key {0:?} is unknown")]
    KeyNotFound(String),

    /// Outside the `nbf`..`exp` window
    #[error("token is expired or not yet valid")]
    TokenExpired,

    /// `aud` does not match the configured audience
    #[error("token audience is invalid")]
    AudienceMismatch,
}

/// Outcome of a failed authenticate/authorize call.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No authorization header present
    #[error("authorization header is required")]
    MissingAuthHeader,

    /// Authorization header is not `Bearer <token>`
    #[error("invalid authorization header format (expected 'Bearer <token>')")]
    InvalidAuthHeader,

    /// Credential failed cryptographic or structural validation
    #[error("not authenticated: {0}")]
    Unauthenticated(#[from] CredentialError),

    /// Authentication policy ran and rejected the credential
    #[error("not authenticated: rejected by authentication policy")]
    AuthenticationDenied,

    /// Authorization policy ran and rejected the caller
    #[error("not authorized for rule {rule}")]
    Forbidden { rule: AuthzRule },

    /// A policy could not produce a usable decision
    #[error("policy evaluation failed: {0}")]
    Policy(PolicyError),

    /// Caller gave up before a decision was reached
    #[error("request cancelled before a decision was reached")]
    Cancelled,
}

impl From<PolicyError> for AuthError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::Cancelled | PolicyError::DeadlineExceeded => AuthError::Cancelled,
            other => AuthError::Policy(other),
        }
    }
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Stable, non-revealing code reported to clients.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::Unauthenticated(_) | AuthError::AuthenticationDenied => "unauthenticated",
            AuthError::Forbidden { .. } => "forbidden",
            AuthError::Policy(_) => "internal_error",
            AuthError::Cancelled => "cancelled",
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::Unauthenticated(_)
            | AuthError::AuthenticationDenied => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AuthError::Policy(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Whether this is a "who are you" failure.
    pub fn is_authentication_failure(&self) -> bool {
        self.status_code() == StatusCode::UNAUTHORIZED
    }

    /// Message safe to show a client. Never says which credential check
    /// failed.
    fn public_message(&self) -> String {
        match self {
            AuthError::Unauthenticated(_) | AuthError::AuthenticationDenied => {
                "not authenticated".to_string()
            }
            AuthError::Forbidden { .. } => "not authorized".to_string(),
            AuthError::Policy(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            AuthError::Policy(e) => error!(error = %e, "Policy evaluation failed"),
            other => debug!(error = %other, status = status.as_u16(), "Request rejected"),
        }

        let body = Json(AuthErrorBody {
            error: self.public_message(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_auth_returns_401() {
        let response = AuthError::MissingAuthHeader.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error_code"], "missing_auth_header");
    }

    #[tokio::test]
    async fn credential_failures_share_one_generic_body() {
        let expired = body_json(
            AuthError::Unauthenticated(CredentialError::TokenExpired).into_response(),
        )
        .await;
        let bad_sig = body_json(
            AuthError::Unauthenticated(CredentialError::SignatureInvalid).into_response(),
        )
        .await;
        let denied = body_json(AuthError::AuthenticationDenied.into_response()).await;

        assert_eq!(expired, bad_sig);
        assert_eq!(expired, denied);
        assert_eq!(expired["error"], "not authenticated");
    }

    #[tokio::test]
    async fn forbidden_returns_403() {
        let response = AuthError::Forbidden {
            rule: AuthzRule::AdminOnly,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["error_code"], "forbidden");
    }

    #[tokio::test]
    async fn policy_failure_returns_500_without_details() {
        let response =
            AuthError::Policy(PolicyError::Eval("type mismatch".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "internal error");
    }

    #[test]
    fn cancellation_is_not_reported_as_policy_failure() {
        assert!(matches!(
            AuthError::from(PolicyError::Cancelled),
            AuthError::Cancelled
        ));
        assert!(matches!(
            AuthError::from(PolicyError::DeadlineExceeded),
            AuthError::Cancelled
        ));
        assert!(matches!(
            AuthError::from(PolicyError::Eval("x".into())),
            AuthError::Policy(_)
        ));
    }

    #[test]
    fn only_credential_failures_are_authentication_failures() {
        assert!(AuthError::Unauthenticated(CredentialError::TokenMalformed)
            .is_authentication_failure());
        assert!(!AuthError::Forbidden {
            rule: AuthzRule::Any
        }
        .is_authentication_failure());
    }
}
