// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles carried inside credentials.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Roles a credential can grant.
///
/// The set is closed: a role string outside of it is rejected when claims are
/// built or decoded, never later when a policy is queried. Which role
/// satisfies which access rule is decided by the authorization policy module,
/// not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Full administrative access
    Admin,
    /// Regular authenticated user
    User,
}

/// Error returned when parsing an unknown role name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid role {0:?}")]
pub struct InvalidRole(pub String);

impl Role {
    /// Every known role, in declaration order.
    pub const ALL: [Role; 2] = [Role::Admin, Role::User];

    /// Canonical wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }

    /// Parse a comma-separated role list (`"ADMIN,USER"`), keeping first
    /// occurrence order and dropping duplicates.
    pub fn parse_list(s: &str) -> Result<Vec<Role>, InvalidRole> {
        let mut roles = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let role = part.parse()?;
            if !roles.contains(&role) {
                roles.push(role);
            }
        }
        Ok(roles)
    }
}

impl FromStr for Role {
    type Err = InvalidRole;

    /// Role names are matched exactly; `"admin"` is not `ADMIN`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            other => Err(InvalidRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
