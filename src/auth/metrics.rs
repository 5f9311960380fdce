// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decision counters.
//!
//! [`AccessControl`](super::access::AccessControl) reports every outcome to a
//! [`DecisionSink`] handed to it at construction. There is no global registry.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Outcome of one authenticate or authorize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied,
    Failed,
}

/// Which stage produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Authentication,
    Authorization,
}

pub trait DecisionSink: Send + Sync + Debug {
    fn record(&self, stage: Stage, decision: Decision);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DecisionSink for NoopSink {
    fn record(&self, _stage: Stage, _decision: Decision) {}
}

/// In-process counters, one per stage and outcome.
#[derive(Debug, Default)]
pub struct CounterSink {
    counters: [[AtomicU64; 3]; 2],
}

/// Point-in-time copy of a [`CounterSink`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecisionCounts {
    pub authn_allowed: u64,
    pub authn_denied: u64,
    pub authn_failed: u64,
    pub authz_allowed: u64,
    pub authz_denied: u64,
    pub authz_failed: u64,
}

impl CounterSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> DecisionCounts {
        let get = |stage: Stage, decision: Decision| {
            self.counters[stage as usize][decision as usize].load(Ordering::Relaxed)
        };
        DecisionCounts {
            authn_allowed: get(Stage::Authentication, Decision::Allowed),
            authn_denied: get(Stage::Authentication, Decision::Denied),
            authn_failed: get(Stage::Authentication, Decision::Failed),
            authz_allowed: get(Stage::Authorization, Decision::Allowed),
            authz_denied: get(Stage::Authorization, Decision::Denied),
            authz_failed: get(Stage::Authorization, Decision::Failed),
        }
    }
}

impl DecisionSink for CounterSink {
    fn record(&self, stage: Stage, decision: Decision) {
        self.counters[stage as usize][decision as usize].fetch_add(1, Ordering::Relaxed);
    }
}
