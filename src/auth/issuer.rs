// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential minting.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{encode, Algorithm, Header};
use tracing::debug;
use uuid::Uuid;

use super::clock::Clock;
use super::keystore::{KeyStore, KeyStoreError};
use super::{Claims, Role};

/// Signing algorithm for every credential this service issues and accepts.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::RS256;

/// Errors from [`Issuer`].
#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error(transparent)]
    Key(#[from] KeyStoreError),

    #[error("credential lifetime must be positive and end in a representable time")]
    InvalidTtl,

    #[error("signing credential: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Builds and signs credentials.
///
/// Stateless apart from shared read-only handles, so one instance can be used
/// from any number of threads.
#[derive(Debug, Clone)]
pub struct Issuer {
    keys: Arc<KeyStore>,
    clock: Arc<dyn Clock>,
}

impl Issuer {
    pub fn new(keys: Arc<KeyStore>, clock: Arc<dyn Clock>) -> Self {
        Self { keys, clock }
    }

    /// Mint a credential for `subject` valid for `ttl` from now.
    ///
    /// Roles are embedded as given; whether they grant anything is decided by
    /// the authorization policy at request time.
    pub fn issue(
        &self,
        kid: &str,
        subject: &str,
        issuer: &str,
        roles: &[Role],
        ttl: Duration,
    ) -> Result<String, IssueError> {
        self.issue_for(kid, subject, issuer, None, roles, ttl)
    }

    /// Like [`issue`](Self::issue), additionally binding the credential to
    /// `audience` when one is given.
    pub fn issue_for(
        &self,
        kid: &str,
        subject: &str,
        issuer: &str,
        audience: Option<&str>,
        roles: &[Role],
        ttl: Duration,
    ) -> Result<String, IssueError> {
        if ttl.is_zero() {
            return Err(IssueError::InvalidTtl);
        }
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| IssueError::InvalidTtl)?;

        let mut claims = Claims::new(subject, issuer, roles, self.clock.now(), ttl)
            .ok_or(IssueError::InvalidTtl)?
            .with_token_id(Uuid::new_v4().to_string());
        if let Some(audience) = audience {
            claims = claims.with_audience(audience);
        }
        self.issue_claims(kid, &claims)
    }

    /// Sign caller-built claims with key `kid`.
    pub fn issue_claims(&self, kid: &str, claims: &Claims) -> Result<String, IssueError> {
        if claims.exp <= claims.iat {
            return Err(IssueError::InvalidTtl);
        }
        let key = self.keys.lookup_private(kid)?;

        let mut header = Header::new(SIGNING_ALGORITHM);
        header.kid = Some(key.kid().to_string());

        let token = encode(&header, claims, key.encoding_key())?;
        debug!(kid, sub = %claims.sub, exp = claims.exp, "Issued credential");
        Ok(token)
    }
}
