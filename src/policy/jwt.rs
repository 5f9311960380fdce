// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `io.jwt.decode_verify` for the Rego engine.
//!
//! Registered on every engine as an extension taking `(token, constraints)`
//! and returning `[valid, header, payload]`. Supported constraints:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `cert` | PEM public key (required) |
//! | `iss` | expected issuer |
//! | `aud` | expected audience |
//! | `time` | evaluation time in nanoseconds since the epoch; defaults to now |
//!
//! A credential that fails verification is not an error; it yields
//! `[false, {}, {}]`. Bad constraints are.

use std::collections::HashSet;

use anyhow::anyhow;
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{json, Map, Value};

pub(crate) const DECODE_VERIFY: &str = "io.jwt.decode_verify";

/// Add the JWT extensions to `engine`.
pub(crate) fn register(engine: &mut regorus::Engine) -> anyhow::Result<()> {
    engine.add_extension(DECODE_VERIFY.to_string(), 2, Box::new(decode_verify_extension))
}

fn decode_verify_extension(args: Vec<regorus::Value>) -> anyhow::Result<regorus::Value> {
    let [token, constraints] = args.as_slice() else {
        return Err(anyhow!("{DECODE_VERIFY}: expected 2 arguments, got {}", args.len()));
    };
    if matches!(token, regorus::Value::Undefined) || matches!(constraints, regorus::Value::Undefined)
    {
        return Ok(regorus::Value::Undefined);
    }

    let token: Value = serde_json::from_str(&token.to_json_str()?)?;
    let token = token
        .as_str()
        .ok_or_else(|| anyhow!("{DECODE_VERIFY}: token must be a string"))?;
    let constraints: Value = serde_json::from_str(&constraints.to_json_str()?)?;

    let verdict = decode_verify(token, &constraints)?;
    regorus::Value::from_json_str(&verdict.to_string())
}

/// Verification constraints.
struct Constraints<'a> {
    cert: &'a str,
    iss: Option<&'a str>,
    aud: Option<&'a str>,
    time_ns: Option<f64>,
}

impl<'a> Constraints<'a> {
    fn parse(v: &'a Value) -> anyhow::Result<Self> {
        let fields = v
            .as_object()
            .ok_or_else(|| anyhow!("{DECODE_VERIFY}: constraints must be an object"))?;
        let text = |key: &str, value: &'a Value| {
            value
                .as_str()
                .ok_or_else(|| anyhow!("{DECODE_VERIFY}: {key} must be a string"))
        };

        let mut constraints = Constraints {
            cert: "",
            iss: None,
            aud: None,
            time_ns: None,
        };
        for (key, value) in fields {
            match key.as_str() {
                "cert" => constraints.cert = text(key, value)?,
                "iss" => constraints.iss = Some(text(key, value)?),
                "aud" => constraints.aud = Some(text(key, value)?),
                "time" => {
                    constraints.time_ns = Some(
                        value
                            .as_f64()
                            .ok_or_else(|| anyhow!("{DECODE_VERIFY}: time must be a number"))?,
                    )
                }
                other => return Err(anyhow!("{DECODE_VERIFY}: unknown constraint {other:?}")),
            }
        }
        if constraints.cert.is_empty() {
            return Err(anyhow!("{DECODE_VERIFY}: cert constraint is required"));
        }
        Ok(constraints)
    }
}

fn invalid() -> Value {
    json!([false, {}, {}])
}

fn json_segment(segment: &str) -> Option<Map<String, Value>> {
    let bytes = Base64UrlUnpadded::decode_vec(segment).ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

pub(crate) fn decode_verify(token: &str, constraints: &Value) -> anyhow::Result<Value> {
    let constraints = Constraints::parse(constraints)?;
    let key = DecodingKey::from_rsa_pem(constraints.cert.as_bytes())
        .map_err(|e| anyhow!("{DECODE_VERIFY}: invalid cert: {e}"))?;

    let Some(header) = token.split('.').next().and_then(json_segment) else {
        return Ok(invalid());
    };
    let algorithm = match header.get("alg").and_then(Value::as_str) {
        Some("RS256") => Algorithm::RS256,
        Some("RS384") => Algorithm::RS384,
        Some("RS512") => Algorithm::RS512,
        _ => return Ok(invalid()),
    };

    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();
    let payload = match jsonwebtoken::decode::<Map<String, Value>>(token, &key, &validation) {
        Ok(data) => data.claims,
        Err(_) => return Ok(invalid()),
    };

    let now_secs = match constraints.time_ns {
        Some(ns) => ns / 1e9,
        None => Utc::now().timestamp() as f64,
    };
    if let Some(exp) = payload.get("exp") {
        match exp.as_f64() {
            Some(exp) if now_secs <= exp => {}
            _ => return Ok(invalid()),
        }
    }
    if let Some(nbf) = payload.get("nbf") {
        match nbf.as_f64() {
            Some(nbf) if now_secs >= nbf => {}
            _ => return Ok(invalid()),
        }
    }
    if let Some(iss) = constraints.iss {
        if payload.get("iss").and_then(Value::as_str) != Some(iss) {
            return Ok(invalid());
        }
    }
    if let Some(aud) = constraints.aud {
        let matches = match payload.get("aud") {
            Some(Value::String(s)) => s == aud,
            Some(Value::Array(items)) => items.iter().any(|i| i.as_str() == Some(aud)),
            _ => false,
        };
        if !matches {
            return Ok(invalid());
        }
    }

    Ok(json!([true, header, payload]))
}
