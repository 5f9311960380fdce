// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing key store.
//!
//! ## Layout
//!
//! ```text
//! keys/
//!   private.pem     # kid = "private"
//!   2026-rotation.pem
//! ```
//!
//! Each `*.pem` file holds one RSA private key, either PKCS#1
//! (`RSA PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`). The key identifier is
//! the file stem. The store is built once at startup and is read-only after
//! that; a load error of any single file aborts the whole load so the process
//! never serves with a partial key set.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jsonwebtoken::{DecodingKey, EncodingKey};
use ring::signature::{KeyPair as _, RsaKeyPair};
use tracing::{debug, info};

/// PEM label of a PKCS#1 RSA private key (`openssl genrsa -traditional`).
const PKCS1_KEY_LABEL: &str = "RSA PRIVATE KEY";

/// PEM label of a PKCS#8 private key (`openssl genpkey`).
const PKCS8_KEY_LABEL: &str = "PRIVATE KEY";

/// PEM label used when exporting the derived public key.
const PUBLIC_KEY_LABEL: &str = "RSA PUBLIC KEY";

/// Errors from loading or querying the key store.
#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("reading key directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("key {kid:?}: {reason}")]
    InvalidKey { kid: String, reason: String },

    #[error("duplicate key id {0:?}")]
    DuplicateKey(String),

    #[error("no keys found")]
    NoKeys,

    #[error("key {0:?} not found")]
    KeyNotFound(String),
}

/// One signing key and its verification counterpart.
pub struct KeyPair {
    kid: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
    public_pem: String,
}

impl KeyPair {
    /// Parse a PEM encoded RSA private key.
    pub fn from_pem(kid: impl Into<String>, pem_bytes: &[u8]) -> Result<Self, KeyStoreError> {
        let kid = kid.into();
        let invalid = |reason: String| KeyStoreError::InvalidKey {
            kid: kid.clone(),
            reason,
        };

        let block = pem::parse(pem_bytes).map_err(|e| invalid(format!("bad PEM: {e}")))?;
        let der = block.contents();
        let ring_key = match block.tag() {
            PKCS1_KEY_LABEL => RsaKeyPair::from_der(der),
            PKCS8_KEY_LABEL => RsaKeyPair::from_pkcs8(der),
            other => return Err(invalid(format!("unexpected PEM label {other:?}"))),
        }
        .map_err(|e| invalid(format!("rejected RSA key: {e}")))?;
        let public_der = ring_key.public_key().as_ref().to_vec();

        let encoding = EncodingKey::from_rsa_pem(pem_bytes)
            .map_err(|e| invalid(format!("rejected RSA key: {e}")))?;
        let public_pem = pem::encode(&pem::Pem::new(PUBLIC_KEY_LABEL, public_der.clone()));

        Ok(Self {
            encoding,
            decoding: DecodingKey::from_rsa_der(&public_der),
            public_pem,
            kid,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }

    /// Public key as `RSA PUBLIC KEY` PEM text.
    pub fn public_key_pem(&self) -> &str {
        &self.public_pem
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

/// Immutable map from key id to key pair.
#[derive(Debug, Default)]
pub struct KeyStore {
    keys: HashMap<String, Arc<KeyPair>>,
}

impl KeyStore {
    /// Load every `*.pem` file in `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, KeyStoreError> {
        let dir = dir.as_ref();
        let io_err = |source| KeyStoreError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut entries = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("pem") {
                continue;
            }
            let Some(kid) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let bytes = fs::read(&path).map_err(|source| KeyStoreError::Io {
                path: path.clone(),
                source,
            })?;
            debug!(kid, path = %path.display(), "Read signing key");
            entries.push((kid.to_string(), bytes));
        }

        let store = Self::from_pem_entries(entries)?;
        info!(dir = %dir.display(), kids = ?store.kids(), "Key store loaded");
        Ok(store)
    }

    /// Build from `(kid, pem)` pairs, e.g. keys embedded with `include_bytes!`.
    pub fn from_pem_entries<I, K, B>(entries: I) -> Result<Self, KeyStoreError>
    where
        I: IntoIterator<Item = (K, B)>,
        K: Into<String>,
        B: AsRef<[u8]>,
    {
        let mut keys = HashMap::new();
        for (kid, pem_bytes) in entries {
            let pair = KeyPair::from_pem(kid, pem_bytes.as_ref())?;
            let kid = pair.kid().to_string();
            if keys.insert(kid.clone(), Arc::new(pair)).is_some() {
                return Err(KeyStoreError::DuplicateKey(kid));
            }
        }

        if keys.is_empty() {
            return Err(KeyStoreError::NoKeys);
        }
        Ok(Self { keys })
    }

    /// Key pair used for signing.
    pub fn lookup_private(&self, kid: &str) -> Result<Arc<KeyPair>, KeyStoreError> {
        self.keys
            .get(kid)
            .cloned()
            .ok_or_else(|| KeyStoreError::KeyNotFound(kid.to_string()))
    }

    /// Verification key for `kid`.
    pub fn lookup_public(&self, kid: &str) -> Result<&DecodingKey, KeyStoreError> {
        self.get(kid).map(KeyPair::decoding_key)
    }

    /// Verification key for `kid` as PEM text.
    pub fn public_key_pem(&self, kid: &str) -> Result<&str, KeyStoreError> {
        self.get(kid).map(KeyPair::public_key_pem)
    }

    /// Sorted list of loaded key ids.
    pub fn kids(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        kids
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    fn get(&self, kid: &str) -> Result<&KeyPair, KeyStoreError> {
        self.keys
            .get(kid)
            .map(Arc::as_ref)
            .ok_or_else(|| KeyStoreError::KeyNotFound(kid.to_string()))
    }
}
