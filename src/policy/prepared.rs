// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Compiled modules and prepared queries.
//!
//! A [`PolicyModule`] is one Rego source loaded into a `regorus` engine with
//! the JWT extensions registered. [`PreparedQuery::prepare`] binds the engine
//! to `x = data.<package>.<rule>` and checks that the rule yields a value;
//! [`PreparedQuery::eval`] runs a private clone of that engine per call, so
//! the prepared query itself is never mutated.

use std::fmt;

use serde_json::Value;
use tracing::trace;

use super::{jwt, EvalContext, PolicyError, PolicyInput, QueryResult, ResultSet, DECISION_BINDING};

/// A parsed Rego module.
#[derive(Clone)]
pub struct PolicyModule {
    name: String,
    package: String,
    engine: regorus::Engine,
}

impl PolicyModule {
    /// Load `source` under `name`. Syntax errors carry the engine's
    /// line and column.
    pub fn parse(name: &str, source: &str) -> Result<Self, PolicyError> {
        let parse_error = |message: String| PolicyError::Parse {
            module: name.to_string(),
            message,
        };

        let package = source
            .lines()
            .find_map(|line| line.trim().strip_prefix("package "))
            .map(|p| p.trim().to_string())
            .ok_or_else(|| parse_error("missing package declaration".to_string()))?;

        let mut engine = regorus::Engine::new();
        jwt::register(&mut engine).map_err(|e| parse_error(e.to_string()))?;
        engine
            .add_policy(format!("{name}.rego"), source.to_string())
            .map_err(|e| parse_error(e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            package,
            engine,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted package path, e.g. `authgate.authz`.
    pub fn package(&self) -> &str {
        &self.package
    }
}

impl fmt::Debug for PolicyModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyModule")
            .field("name", &self.name)
            .field("package", &self.package)
            .finish_non_exhaustive()
    }
}

/// A query bound to one rule of one module.
#[derive(Clone)]
pub struct PreparedQuery {
    module: String,
    query: String,
    engine: regorus::Engine,
}

impl PreparedQuery {
    /// Bind `rule` of `module`.
    ///
    /// The rule must yield a value for an empty input, which every rule with
    /// a `default` does. An unknown rule fails here rather than denying every
    /// call later.
    pub fn prepare(module: &PolicyModule, rule: &str) -> Result<Self, PolicyError> {
        let prepared = Self {
            module: module.name.clone(),
            query: format!("{DECISION_BINDING} = data.{}.{rule}", module.package),
            engine: module.engine.clone(),
        };

        let trial = prepared.run(&PolicyInput::new())?;
        if trial
            .iter()
            .all(|result| !result.bindings.contains_key(DECISION_BINDING))
        {
            return Err(PolicyError::UnknownRule {
                query: prepared.query,
            });
        }
        Ok(prepared)
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Evaluate against `input`.
    ///
    /// The context is checked before the engine runs and again when it
    /// returns; a result reached after cancellation or past the deadline is
    /// discarded.
    pub fn eval(&self, input: &PolicyInput, ctx: &EvalContext) -> Result<ResultSet, PolicyError> {
        ctx.check()?;
        let results = self.run(input)?;
        ctx.check()?;
        trace!(module = %self.module, query = %self.query, results = results.len(), "Evaluated policy query");
        Ok(results)
    }

    fn run(&self, input: &PolicyInput) -> Result<ResultSet, PolicyError> {
        let eval_error = |e: anyhow::Error| PolicyError::Eval(format!("{}: {e}", self.module));

        let mut engine = self.engine.clone();
        engine.set_input(regorus::Value::from_json_str(&input.to_value().to_string()).map_err(eval_error)?);
        let results = engine
            .eval_query(self.query.clone(), false)
            .map_err(eval_error)?;
        let results = serde_json::to_value(&results)
            .map_err(|e| PolicyError::Eval(format!("{}: {e}", self.module)))?;

        let mut set = ResultSet::default();
        let rows = results
            .get("result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for row in rows {
            let bindings = match row.get("bindings") {
                Some(Value::Object(bindings)) => bindings.clone(),
                _ => Default::default(),
            };
            set.push(QueryResult { bindings });
        }
        Ok(set)
    }
}

impl fmt::Debug for PreparedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedQuery")
            .field("module", &self.module)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}
