// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::auth::metrics::CounterSink;
use crate::auth::AccessControl;
use crate::policy::EvalContext;

#[derive(Clone)]
pub struct AppState {
    pub access: Arc<AccessControl>,
    pub decisions: Arc<CounterSink>,
    /// Upper bound on one policy evaluation
    pub policy_timeout: Option<Duration>,
    /// Cancelled when the server begins shutting down
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(access: AccessControl) -> Self {
        let decisions = Arc::new(CounterSink::new());
        Self {
            access: Arc::new(access.with_sink(decisions.clone())),
            decisions,
            policy_timeout: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_policy_timeout(mut self, timeout: Duration) -> Self {
        self.policy_timeout = Some(timeout);
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Evaluation context for one request.
    pub fn eval_context(&self) -> EvalContext {
        let ctx = EvalContext::background().with_cancellation(self.shutdown.child_token());
        match self.policy_timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        }
    }
}
