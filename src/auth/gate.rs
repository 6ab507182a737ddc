//! Authorization gate
//!
//! Stamps each protected request with an authenticated account. The token
//! is only the entry ticket: the account is always re-loaded from the
//! registry so role and existence are current, never trusted from the
//! token alone. Every failure collapses to the same `Unauthorized`.

use bson::oid::ObjectId;
use tracing::debug;

use crate::auth::jwt::{extract_token_from_header, JwtValidator};
use crate::db::schemas::UserDoc;
use crate::registry::AccountRegistry;
use crate::types::{Result, TownhallError};

/// Authenticate a request from its Authorization header.
///
/// Datastore failures propagate as `Database`; everything else is the
/// generic `Unauthorized`.
pub async fn authenticate(
    jwt: &JwtValidator,
    registry: &AccountRegistry,
    auth_header: Option<&str>,
) -> Result<UserDoc> {
    let token = extract_token_from_header(auth_header).ok_or(TownhallError::Unauthorized)?;

    let result = jwt.verify_token(token);
    let claims = match (result.valid, result.claims) {
        (true, Some(claims)) => claims,
        _ => {
            debug!(
                "token rejected: {}",
                result.error.as_deref().unwrap_or("unknown")
            );
            return Err(TownhallError::Unauthorized);
        }
    };

    let subject = ObjectId::parse_str(&claims.sub).map_err(|_| TownhallError::Unauthorized)?;

    registry
        .find_by_id(&subject)
        .await?
        .ok_or(TownhallError::Unauthorized)
}

/// Gate admin-only operations.
pub fn require_admin(user: &UserDoc) -> Result<()> {
    if user.role.is_admin() {
        Ok(())
    } else {
        Err(TownhallError::Forbidden(
            "access denied: admins only".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::roles::Role;

    fn user_with_role(role: Role) -> UserDoc {
        UserDoc::new(
            "Ada".into(),
            "ada@example.com".into(),
            "$argon2id$stub".into(),
            role,
        )
    }

    #[test]
    fn admins_pass_the_role_gate() {
        assert!(require_admin(&user_with_role(Role::Admin)).is_ok());
    }

    #[test]
    fn citizens_are_forbidden() {
        let err = require_admin(&user_with_role(Role::Citizen)).unwrap_err();
        assert!(matches!(err, TownhallError::Forbidden(_)));
    }
}
