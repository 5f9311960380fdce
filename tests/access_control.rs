// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! End-to-end access decisions over keys loaded from disk.

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use authgate::auth::{
    AccessControl, AuthError, CredentialError, FixedClock, KeyStore, KeyStoreError, Role,
    Validator,
};
use authgate::policy::{AuthzRule, EvalContext, PolicyEngine};

const PRIMARY: &str = include_str!("fixtures/keys/private.pem");
const SECONDARY: &str = include_str!("fixtures/keys/secondary.pem");
const ISSUER: &str = "service project";
const NOW: i64 = 1_700_000_000;
const HOUR: Duration = Duration::from_secs(3600);

fn key_dir(entries: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    for (kid, pem) in entries {
        fs::write(dir.path().join(format!("{kid}.pem")), pem).expect("write key");
    }
    dir
}

fn at(secs: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp(secs, 0).expect("valid timestamp")
}

fn access_over(keys: KeyStore, clock: Arc<FixedClock>) -> AccessControl {
    let policies = Arc::new(PolicyEngine::embedded().expect("embedded policies"));
    AccessControl::new(Arc::new(keys), policies, clock)
}

#[test]
fn admin_and_user_end_to_end() {
    let dir = key_dir(&[("private", PRIMARY)]);
    let clock = Arc::new(FixedClock::at_secs(NOW));
    let access = access_over(KeyStore::from_dir(dir.path()).unwrap(), clock);
    let ctx = EvalContext::background();

    let admin = access
        .issuer()
        .issue("private", "u1", ISSUER, &[Role::Admin], HOUR)
        .unwrap();
    let claims = access.authenticate(&ctx, &admin).unwrap();
    assert_eq!(claims.sub, "u1");
    assert_eq!(claims.roles, vec![Role::Admin]);
    access.authorize(&ctx, &claims, AuthzRule::AdminOnly).unwrap();

    let user = access
        .issuer()
        .issue("private", "u1", ISSUER, &[Role::User], HOUR)
        .unwrap();
    let claims = access.authenticate(&ctx, &user).unwrap();
    assert!(matches!(
        access.authorize(&ctx, &claims, AuthzRule::AdminOnly),
        Err(AuthError::Forbidden {
            rule: AuthzRule::AdminOnly
        })
    ));
    access.authorize(&ctx, &claims, AuthzRule::UserOnly).unwrap();
    access.authorize(&ctx, &claims, AuthzRule::AdminOrSubject).unwrap();
}

#[test]
fn expired_credential_is_rejected() {
    let dir = key_dir(&[("private", PRIMARY)]);
    let clock = Arc::new(FixedClock::at_secs(NOW));
    let access = access_over(KeyStore::from_dir(dir.path()).unwrap(), clock.clone());

    let token = access
        .issuer()
        .issue("private", "u1", ISSUER, &[Role::Admin], HOUR)
        .unwrap();
    clock.advance(chrono::Duration::seconds(3601));

    assert!(matches!(
        access.authenticate(&EvalContext::background(), &token),
        Err(AuthError::Unauthenticated(CredentialError::TokenExpired))
    ));
}

#[test]
fn token_from_unknown_key_is_rejected() {
    let clock = Arc::new(FixedClock::at_secs(NOW));
    let signer = access_over(
        KeyStore::from_pem_entries([("a", PRIMARY)]).unwrap(),
        clock.clone(),
    );
    let token = signer
        .issuer()
        .issue("a", "u1", ISSUER, &[Role::Admin], HOUR)
        .unwrap();

    let verifier = access_over(KeyStore::from_pem_entries([("b", SECONDARY)]).unwrap(), clock);
    let err = verifier
        .authenticate(&EvalContext::background(), &token)
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::Unauthenticated(CredentialError::KeyNotFound(ref kid)) if kid == "a"
    ));
}

#[test]
fn authentication_policy_checks_time_on_its_own() {
    let keys = Arc::new(KeyStore::from_pem_entries([("private", PRIMARY)]).unwrap());
    let access = AccessControl::new(
        keys.clone(),
        Arc::new(PolicyEngine::embedded().unwrap()),
        Arc::new(FixedClock::at_secs(NOW)),
    );
    let token = access
        .issuer()
        .issue("private", "u1", ISSUER, &[Role::Admin], HOUR)
        .unwrap();
    let pem = keys.public_key_pem("private").unwrap();
    let engine = PolicyEngine::embedded().unwrap();

    let within = EvalContext::background().at(at(NOW + 60));
    assert!(engine
        .evaluate_authentication(&within, pem, &token, ISSUER)
        .unwrap());

    let after = EvalContext::background().at(at(NOW + 7200));
    assert!(!engine
        .evaluate_authentication(&after, pem, &token, ISSUER)
        .unwrap());
}

#[test]
fn foreign_issuer_passes_validator_but_not_policy() {
    let keys = Arc::new(KeyStore::from_pem_entries([("private", PRIMARY)]).unwrap());
    let clock = Arc::new(FixedClock::at_secs(NOW));
    let access = AccessControl::new(
        keys.clone(),
        Arc::new(PolicyEngine::embedded().unwrap()),
        clock.clone(),
    );
    let token = access
        .issuer()
        .issue("private", "u1", "https://elsewhere.example", &[Role::Admin], HOUR)
        .unwrap();

    let claims = Validator::new(keys, clock).validate(&token).unwrap();
    assert_eq!(claims.iss, "https://elsewhere.example");

    assert!(matches!(
        access.authenticate(&EvalContext::background(), &token),
        Err(AuthError::AuthenticationDenied)
    ));
}

#[test]
fn key_directory_errors_are_fatal() {
    let empty = key_dir(&[]);
    assert!(matches!(
        KeyStore::from_dir(empty.path()),
        Err(KeyStoreError::NoKeys)
    ));

    let broken = key_dir(&[
        ("private", PRIMARY),
        ("broken", include_str!("fixtures/broken.pem")),
    ]);
    assert!(matches!(
        KeyStore::from_dir(broken.path()),
        Err(KeyStoreError::InvalidKey { ref kid, .. }) if kid == "broken"
    ));
}

#[test]
fn deadline_in_the_past_is_cancelled() {
    let access = access_over(
        KeyStore::from_pem_entries([("private", PRIMARY)]).unwrap(),
        Arc::new(FixedClock::at_secs(NOW)),
    );
    let token = access
        .issuer()
        .issue("private", "u1", ISSUER, &[Role::Admin], HOUR)
        .unwrap();
    let ctx = EvalContext::background().with_timeout(Duration::ZERO);
    assert!(matches!(
        access.authenticate(&ctx, &token),
        Err(AuthError::Cancelled)
    ));
}

#[test]
fn concurrent_decisions_share_one_instance() {
    let access = Arc::new(access_over(
        KeyStore::from_pem_entries([("private", PRIMARY), ("secondary", SECONDARY)]).unwrap(),
        Arc::new(FixedClock::at_secs(NOW)),
    ));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let access = access.clone();
            thread::spawn(move || {
                let kid = if i % 2 == 0 { "private" } else { "secondary" };
                let role = if i % 3 == 0 { Role::Admin } else { Role::User };
                let subject = format!("u{i}");
                for _ in 0..10 {
                    let ctx = EvalContext::background();
                    let token = access
                        .issuer()
                        .issue(kid, &subject, ISSUER, &[role], HOUR)
                        .unwrap();
                    let claims = access.authenticate(&ctx, &token).unwrap();
                    assert_eq!(claims.sub, subject);
                    let admin = access.authorize(&ctx, &claims, AuthzRule::AdminOnly);
                    assert_eq!(admin.is_ok(), role == Role::Admin);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker panicked");
    }
}
