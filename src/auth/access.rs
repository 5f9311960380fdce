// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access decisions.
//!
//! [`AccessControl`] composes the validator with the two policy modules:
//!
//! ```text
//! token ──▶ Validator ──▶ authentication policy ──▶ Claims
//! Claims + rule ──▶ authorization policy ──▶ allow / Forbidden
//! ```
//!
//! The authentication policy re-verifies the token on its own with the
//! public key of the token's `kid`; a credential passes only if both layers
//! accept it. Both layers read time from the same clock.

use std::sync::Arc;

use tracing::{debug, warn};

use super::clock::Clock;
use super::error::{AuthError, CredentialError};
use super::issuer::Issuer;
use super::keystore::KeyStore;
use super::metrics::{Decision, DecisionSink, NoopSink, Stage};
use super::validator::Validator;
use super::Claims;
use crate::policy::{AuthzRule, EvalContext, PolicyEngine};

/// Shared, read-only access decision service.
#[derive(Debug, Clone)]
pub struct AccessControl {
    keys: Arc<KeyStore>,
    validator: Validator,
    issuer: Issuer,
    policies: Arc<PolicyEngine>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn DecisionSink>,
}

impl AccessControl {
    pub fn new(keys: Arc<KeyStore>, policies: Arc<PolicyEngine>, clock: Arc<dyn Clock>) -> Self {
        Self {
            validator: Validator::new(keys.clone(), clock.clone()),
            issuer: Issuer::new(keys.clone(), clock.clone()),
            keys,
            policies,
            clock,
            sink: Arc::new(NoopSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DecisionSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Require credentials to carry `aud == audience`.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.validator = self.validator.with_audience(audience);
        self
    }

    pub fn with_leeway(mut self, secs: u64) -> Self {
        self.validator = self.validator.with_leeway(secs);
        self
    }

    /// Issuer bound to the same key store and clock.
    pub fn issuer(&self) -> &Issuer {
        &self.issuer
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    /// Validate `token` and run the authentication policy on it.
    pub fn authenticate(&self, ctx: &EvalContext, token: &str) -> Result<Claims, AuthError> {
        let result = self.run_authentication(ctx, token);
        self.report(Stage::Authentication, &result);
        result
    }

    fn run_authentication(&self, ctx: &EvalContext, token: &str) -> Result<Claims, AuthError> {
        let claims = self.validator.validate(token)?;

        let kid = Validator::peek_kid(token)?;
        let key_pem = self
            .keys
            .public_key_pem(&kid)
            .map_err(|_| CredentialError::KeyNotFound(kid.clone()))?;

        let ctx = ctx.clone().at(self.clock.now());
        let accepted = self
            .policies
            .evaluate_authentication(&ctx, key_pem, token, &claims.iss)?;
        if !accepted {
            debug!(sub = %claims.sub, iss = %claims.iss, kid = %kid, "Authentication policy denied credential");
            return Err(AuthError::AuthenticationDenied);
        }

        debug!(sub = %claims.sub, kid = %kid, "Authenticated");
        Ok(claims)
    }

    /// Check whether the authorization policy lets `claims` through `rule`.
    pub fn authorize(
        &self,
        ctx: &EvalContext,
        claims: &Claims,
        rule: AuthzRule,
    ) -> Result<(), AuthError> {
        let result = self.run_authorization(ctx, claims, rule);
        self.report(Stage::Authorization, &result);
        result
    }

    fn run_authorization(
        &self,
        ctx: &EvalContext,
        claims: &Claims,
        rule: AuthzRule,
    ) -> Result<(), AuthError> {
        let ctx = ctx.clone().at(self.clock.now());
        let allowed = self
            .policies
            .evaluate_authorization(&ctx, rule, &claims.roles, &claims.sub)?;
        if !allowed {
            debug!(sub = %claims.sub, roles = ?claims.role_names(), %rule, "Authorization denied");
            return Err(AuthError::Forbidden { rule });
        }
        Ok(())
    }

    fn report<T>(&self, stage: Stage, result: &Result<T, AuthError>) {
        let decision = match result {
            Ok(_) => Decision::Allowed,
            Err(
                AuthError::Unauthenticated(_)
                | AuthError::AuthenticationDenied
                | AuthError::Forbidden { .. },
            ) => Decision::Denied,
            Err(e) => {
                if let AuthError::Policy(policy) = e {
                    warn!(?stage, error = %policy, "Policy produced no decision");
                }
                Decision::Failed
            }
        };
        self.sink.record(stage, decision);
    }
}
