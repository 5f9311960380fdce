// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer credentials are RS256-signed JWTs minted by this service.
//!
//! ## Auth Flow
//!
//! 1. A client obtains a credential (see `authgate-admin token`)
//! 2. The client sends `Authorization: Bearer <credential>`
//! 3. The server:
//!    - Validates structure, algorithm, `kid`, signature and lifetime
//!    - Runs the authentication policy on the raw credential
//!    - Runs the authorization policy named by the route on the claims
//!
//! ## Security
//!
//! - Only RS256 is accepted; `none` and HMAC credentials are refused
//! - Private keys never leave the key store; `Debug` output omits them
//! - Rejections never tell the client which check failed

pub mod access;
pub mod claims;
pub mod clock;
pub mod error;
pub mod extractor;
pub mod issuer;
pub mod keystore;
pub mod metrics;
pub mod middleware;
pub mod roles;
pub mod validator;

pub use access::AccessControl;
pub use claims::Claims;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{AuthError, CredentialError};
pub use extractor::{AdminOnly, Auth};
pub use issuer::{IssueError, Issuer};
pub use keystore::{KeyStore, KeyStoreError};
pub use roles::Role;
pub use validator::Validator;
