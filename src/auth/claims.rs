// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential claims.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::roles::Role;

/// Claims embedded in a signed credential.
///
/// Standard registered claims use their JWT names; timestamps are NumericDate
/// seconds. Claims are built once by the issuer and are only ever
/// reconstructed from a credential whose signature has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - stable identity of the caller
    pub sub: String,

    /// Issuer
    pub iss: String,

    /// Intended audience
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    /// Issued at
    pub iat: i64,

    /// Not before
    pub nbf: i64,

    /// Expiration
    pub exp: i64,

    /// Unique token id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Granted roles, in grant order without duplicates
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl Claims {
    /// Claims valid from `now` for `ttl`, or `None` when `now + ttl` is past
    /// the representable range.
    pub fn new(
        subject: impl Into<String>,
        issuer: impl Into<String>,
        roles: &[Role],
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Option<Self> {
        let expires = now.checked_add_signed(ttl)?;
        let mut unique = Vec::with_capacity(roles.len());
        for role in roles {
            if !unique.contains(role) {
                unique.push(*role);
            }
        }

        let iat = now.timestamp();
        Some(Self {
            sub: subject.into(),
            iss: issuer.into(),
            aud: None,
            iat,
            nbf: iat,
            exp: expires.timestamp(),
            jti: None,
            roles: unique,
        })
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.aud = Some(audience.into());
        self
    }

    pub fn with_token_id(mut self, jti: impl Into<String>) -> Self {
        self.jti = Some(jti.into());
        self
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn not_before(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.nbf, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Role names as they are handed to policy modules.
    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.as_str().to_string()).collect()
    }

    /// Whether `now_secs` lies inside `[nbf - leeway, exp + leeway]`.
    pub fn is_live_at(&self, now_secs: i64, leeway_secs: i64) -> bool {
        now_secs >= self.nbf.saturating_sub(leeway_secs)
            && now_secs <= self.exp.saturating_add(leeway_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_claims() -> Claims {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        Claims::new(
            "user_123",
            "service project",
            &[Role::Admin, Role::User, Role::Admin],
            now,
            Duration::hours(1),
        )
        .unwrap()
    }

    #[test]
    fn new_sets_lifetime_from_ttl() {
        let claims = sample_claims();
        assert_eq!(claims.iat, 1_700_000_000);
        assert_eq!(claims.nbf, claims.iat);
        assert_eq!(claims.exp, 1_700_003_600);
    }

    #[test]
    fn new_refuses_unrepresentable_expiry() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let ttl = Duration::seconds(10_000_000_000_000);
        assert!(Claims::new("u", "i", &[], now, ttl).is_none());
    }

    #[test]
    fn new_dedups_roles_keeping_order() {
        assert_eq!(sample_claims().roles, vec![Role::Admin, Role::User]);
    }

    #[test]
    fn live_window_is_inclusive() {
        let claims = sample_claims();
        assert!(claims.is_live_at(claims.nbf, 0));
        assert!(claims.is_live_at(claims.exp, 0));
        assert!(!claims.is_live_at(claims.exp + 1, 0));
        assert!(!claims.is_live_at(claims.nbf - 1, 0));
        assert!(claims.is_live_at(claims.exp + 30, 60));

        let forever = Claims {
            exp: i64::MAX,
            ..sample_claims()
        };
        assert!(forever.is_live_at(i64::MAX, 60));
    }

    #[test]
    fn optional_claims_are_omitted_from_json() {
        let json = serde_json::to_value(sample_claims()).unwrap();
        assert!(json.get("aud").is_none());
        assert!(json.get("jti").is_none());
        assert_eq!(json["roles"], serde_json::json!(["ADMIN", "USER"]));

        let json = serde_json::to_value(sample_claims().with_audience("api").with_token_id("t1"))
            .unwrap();
        assert_eq!(json["aud"], "api");
        assert_eq!(json["jti"], "t1");
    }

    #[test]
    fn unknown_role_fails_to_decode() {
        let raw = r#"{"sub":"u","iss":"i","iat":1,"nbf":1,"exp":2,"roles":["ROOT"]}"#;
        assert!(serde_json::from_str::<Claims>(raw).is_err());
    }

    #[test]
    fn role_names_match_wire_format() {
        assert_eq!(sample_claims().role_names(), vec!["ADMIN", "USER"]);
        assert!(sample_claims().has_role(Role::User));
    }
}
