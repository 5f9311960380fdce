// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential verification.
//!
//! ## Checks
//!
//! Run in order; the first failure is returned:
//!
//! 1. Structure - three segments, decodable JSON header with `alg` and `kid`
//! 2. Algorithm - only [`SIGNING_ALGORITHM`]; `none` and HMAC are refused
//! 3. Key - `kid` must resolve in the key store
//! 4. Signature - over `header.payload` with the resolved public key
//! 5. Time - `nbf <= now <= exp` (plus leeway)
//!
//! Pure CPU work; no I/O happens here, so it runs on every request.

use std::collections::HashSet;
use std::sync::Arc;

use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::{decode, errors::ErrorKind, Validation};
use serde::Deserialize;
use tracing::trace;

use super::clock::Clock;
use super::error::CredentialError;
use super::issuer::SIGNING_ALGORITHM;
use super::keystore::KeyStore;
use super::Claims;

/// Header fields needed before the signature can be checked.
#[derive(Debug, Deserialize)]
struct RawHeader {
    alg: String,
    kid: String,
}

/// Verifies presented credentials against the key store.
#[derive(Debug, Clone)]
pub struct Validator {
    keys: Arc<KeyStore>,
    clock: Arc<dyn Clock>,
    leeway_secs: i64,
    audience: Option<String>,
}

impl Validator {
    pub fn new(keys: Arc<KeyStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            keys,
            clock,
            leeway_secs: 0,
            audience: None,
        }
    }

    /// Clock skew tolerance applied to `nbf` and `exp`.
    pub fn with_leeway(mut self, secs: u64) -> Self {
        self.leeway_secs = i64::try_from(secs).unwrap_or(i64::MAX);
        self
    }

    /// Require `aud` to equal `audience`.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Verify `token` and return its claims.
    pub fn validate(&self, token: &str) -> Result<Claims, CredentialError> {
        let header = parse_header(token)?;

        if header.alg != SIGNING_ALGORITHM_NAME {
            trace!(alg = %header.alg, "Rejected credential algorithm");
            return Err(CredentialError::SignatureInvalid);
        }

        let key = self
            .keys
            .lookup_public(&header.kid)
            .map_err(|_| CredentialError::KeyNotFound(header.kid.clone()))?;

        let claims = decode::<Claims>(token, key, &signature_only())
            .map_err(|e| match e.kind() {
                ErrorKind::Json(_) | ErrorKind::Utf8(_) => CredentialError::TokenMalformed,
                _ => CredentialError::SignatureInvalid,
            })?
            .claims;

        if !claims.is_live_at(self.clock.now_secs(), self.leeway_secs) {
            return Err(CredentialError::TokenExpired);
        }

        if let Some(expected) = &self.audience {
            if claims.aud.as_deref() != Some(expected.as_str()) {
                return Err(CredentialError::AudienceMismatch);
            }
        }

        Ok(claims)
    }

    /// Key id named in the token header, if the header is readable.
    pub fn peek_kid(token: &str) -> Result<String, CredentialError> {
        parse_header(token).map(|h| h.kid)
    }
}

const SIGNING_ALGORITHM_NAME: &str = "RS256";

/// Structural check: exactly three non-empty segments and a JSON header.
fn parse_header(token: &str) -> Result<RawHeader, CredentialError> {
    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(CredentialError::TokenMalformed);
    };
    if header.is_empty() || payload.is_empty() || signature.is_empty() {
        return Err(CredentialError::TokenMalformed);
    }

    let bytes =
        Base64UrlUnpadded::decode_vec(header).map_err(|_| CredentialError::TokenMalformed)?;
    serde_json::from_slice(&bytes).map_err(|_| CredentialError::TokenMalformed)
}

/// Signature verification only; time and audience are checked against the
/// injected clock afterwards.
fn signature_only() -> Validation {
    let mut validation = Validation::new(SIGNING_ALGORITHM);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();
    validation.leeway = 0;
    validation
}
