// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Policy Engine
//!
//! Access decisions are made by two declarative rule modules, kept apart from
//! the code that enforces them:
//!
//! - **authentication** (`authgate.authn`): is this credential acceptable?
//! - **authorization** (`authgate.authz`): may these roles do this?
//!
//! Both are embedded at build time and loaded into `regorus`, a Rego engine
//! compatible with OPA. Each rule is prepared once into a [`PreparedQuery`]
//! shared read-only. Each call evaluates a query against a fresh
//! [`PolicyInput`] and extracts one boolean from binding `x`. Anything other
//! than exactly one boolean is an error; there is no fallback allow.

mod jwt;
mod prepared;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::auth::Role;

pub use prepared::{PolicyModule, PreparedQuery};

/// Authentication module source.
pub const AUTHENTICATION_POLICY: &str = include_str!("rego/authentication.rego");

/// Authorization module source.
pub const AUTHORIZATION_POLICY: &str = include_str!("rego/authorization.rego");

/// Rule evaluated by the authentication module.
pub const AUTHENTICATION_RULE: &str = "auth";

/// Name of the result binding in every query.
const DECISION_BINDING: &str = "x";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("policy {module}: {message}")]
    Parse { module: String, message: String },

    #[error("query {query:?} names an unknown rule")]
    UnknownRule { query: String },

    #[error("evaluation failed: {0}")]
    Eval(String),

    /// Evaluation ran but did not yield exactly one boolean
    #[error("failed to produce a usable decision: {0}")]
    Decision(String),

    #[error("evaluation cancelled")]
    Cancelled,

    #[error("evaluation deadline exceeded")]
    DeadlineExceeded,
}

/// Per-call evaluation context.
#[derive(Debug, Clone)]
pub struct EvalContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    now: DateTime<Utc>,
}

impl EvalContext {
    /// Never cancelled, no deadline, evaluated at the current wall time.
    pub fn background() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
            now: Utc::now(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Timestamp handed to time-dependent rules.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fails once the caller has cancelled or the deadline has passed.
    pub fn check(&self) -> Result<(), PolicyError> {
        if self.cancel.is_cancelled() {
            return Err(PolicyError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(PolicyError::DeadlineExceeded);
        }
        Ok(())
    }
}

/// Named fields exposed to a module as `input`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyInput {
    fields: Map<String, Value>,
}

impl PolicyInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_str(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields
            .insert(name.to_string(), Value::String(value.into()));
        self
    }

    pub fn with_strings<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = values
            .into_iter()
            .map(|v| Value::String(v.into()))
            .collect();
        self.fields.insert(name.to_string(), Value::Array(items));
        self
    }

    pub fn with_int(mut self, name: &str, value: i64) -> Self {
        self.fields.insert(name.to_string(), Value::from(value));
        self
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Variable bindings of one query solution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub bindings: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    results: Vec<QueryResult>,
}

impl ResultSet {
    pub fn push(&mut self, result: QueryResult) {
        self.results.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryResult> {
        self.results.iter()
    }

    /// Boolean held in `binding`.
    ///
    /// Zero results mean the policy ran and denied. More than one result, a
    /// missing binding or a non-boolean value are errors.
    pub fn decision(&self, binding: &str) -> Result<bool, PolicyError> {
        match self.results.as_slice() {
            [] => Ok(false),
            [only] => match only.bindings.get(binding) {
                Some(Value::Bool(allowed)) => Ok(*allowed),
                Some(other) => Err(PolicyError::Decision(format!(
                    "binding {binding:?} is {other}, not a boolean"
                ))),
                None => Err(PolicyError::Decision(format!(
                    "binding {binding:?} is missing"
                ))),
            },
            many => Err(PolicyError::Decision(format!(
                "expected one result, got {}",
                many.len()
            ))),
        }
    }
}

/// Named rules of the authorization module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthzRule {
    /// ADMIN or USER
    Any,
    AdminOnly,
    UserOnly,
    /// ADMIN, or USER acting on their own subject
    AdminOrSubject,
}

impl AuthzRule {
    pub const ALL: [AuthzRule; 4] = [
        AuthzRule::Any,
        AuthzRule::AdminOnly,
        AuthzRule::UserOnly,
        AuthzRule::AdminOrSubject,
    ];

    /// Kebab-case name used in configuration and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthzRule::Any => "any",
            AuthzRule::AdminOnly => "admin-only",
            AuthzRule::UserOnly => "user-only",
            AuthzRule::AdminOrSubject => "admin-or-subject",
        }
    }

    /// Rule name inside the authorization module.
    pub fn rule_name(&self) -> &'static str {
        match self {
            AuthzRule::Any => "rule_any",
            AuthzRule::AdminOnly => "rule_admin_only",
            AuthzRule::UserOnly => "rule_user_only",
            AuthzRule::AdminOrSubject => "rule_admin_or_subject",
        }
    }
}

impl fmt::Display for AuthzRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown authorization rule {0:?}")]
pub struct UnknownAuthzRule(pub String);

impl FromStr for AuthzRule {
    type Err = UnknownAuthzRule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuthzRule::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownAuthzRule(s.to_string()))
    }
}

/// The compiled authentication and authorization queries.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    authentication: PreparedQuery,
    authorization: HashMap<AuthzRule, PreparedQuery>,
}

impl PolicyEngine {
    /// Engine over the modules compiled into the binary.
    pub fn embedded() -> Result<Self, PolicyError> {
        Self::from_sources(AUTHENTICATION_POLICY, AUTHORIZATION_POLICY)
    }

    /// Compile both modules and prepare every query. Any failure here is
    /// fatal for the caller.
    pub fn from_sources(authentication: &str, authorization: &str) -> Result<Self, PolicyError> {
        let authn = PolicyModule::parse("authentication", authentication)?;
        let authz = PolicyModule::parse("authorization", authorization)?;

        let authentication = PreparedQuery::prepare(&authn, AUTHENTICATION_RULE)?;

        let mut prepared = HashMap::with_capacity(AuthzRule::ALL.len());
        for rule in AuthzRule::ALL {
            prepared.insert(rule, PreparedQuery::prepare(&authz, rule.rule_name())?);
        }

        debug!(
            authn_package = %authn.package(),
            authz_package = %authz.package(),
            rules = prepared.len(),
            "Prepared policy queries"
        );
        Ok(Self {
            authentication,
            authorization: prepared,
        })
    }

    /// Does the authentication module accept `token` under `public_key_pem`
    /// and `issuer` at `ctx.now()`?
    pub fn evaluate_authentication(
        &self,
        ctx: &EvalContext,
        public_key_pem: &str,
        token: &str,
        issuer: &str,
    ) -> Result<bool, PolicyError> {
        let input = PolicyInput::new()
            .with_str("Key", public_key_pem)
            .with_str("Token", token)
            .with_str("ISS", issuer)
            .with_int("Time", unix_nanos(ctx.now()));
        self.authentication
            .eval(&input, ctx)?
            .decision(DECISION_BINDING)
    }

    /// Does `rule` allow a caller holding `roles` as `subject`?
    pub fn evaluate_authorization(
        &self,
        ctx: &EvalContext,
        rule: AuthzRule,
        roles: &[Role],
        subject: &str,
    ) -> Result<bool, PolicyError> {
        let query = self.authorization.get(&rule).ok_or_else(|| PolicyError::UnknownRule {
            query: rule.rule_name().to_string(),
        })?;
        let input = PolicyInput::new()
            .with_strings("Roles", roles.iter().map(Role::as_str))
            .with_str("Subject", subject)
            .with_str("UserID", subject);
        query.eval(&input, ctx)?.decision(DECISION_BINDING)
    }
}

fn unix_nanos(at: DateTime<Utc>) -> i64 {
    at.timestamp_nanos_opt()
        .unwrap_or_else(|| at.timestamp().saturating_mul(1_000_000_000))
}
