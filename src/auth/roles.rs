//! Account roles
//!
//! Two flat roles: citizens report and upvote issues, admins triage them.
//! The role is fixed at admission time and travels inside the JWT, but
//! authorization always re-checks the stored role (see `gate`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::TownhallError;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Citizen,
    Admin,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Citizen => write!(f, "citizen"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = TownhallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "citizen" => Ok(Role::Citizen),
            "admin" => Ok(Role::Admin),
            other => Err(TownhallError::InvalidArgument(format!(
                "unknown role: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_role_is_citizen() {
        assert_eq!(Role::default(), Role::Citizen);
        assert!(!Role::default().is_admin());
    }

    #[test]
    fn parse_and_display_roundtrip() {
        for role in [Role::Citizen, Role::Admin] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!("superuser".parse::<Role>().is_err());
        assert!("Admin".parse::<Role>().is_err()); // wire form is lowercase
    }
}
