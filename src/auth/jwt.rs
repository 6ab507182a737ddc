//! JWT issuing and verification
//!
//! Tokens are stateless HS256 bearer proofs carrying the subject id and
//! role plus the standard issued/expiry timestamps. Nothing is stored
//! server-side and there is no revocation list; the gate re-loads the
//! account on every request, so a deleted or missing account cannot ride
//! on an old token.

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::roles::Role;
use crate::types::TownhallError;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: account ObjectId as hex
    pub sub: String,
    /// Role at issue time (advisory; the gate re-checks the stored role)
    pub role: Role,
    /// Issued at (unix seconds)
    pub iat: u64,
    /// Expiry (unix seconds)
    pub exp: u64,
}

/// Input for token generation
#[derive(Debug, Clone)]
pub struct TokenInput {
    pub user_id: String,
    pub role: Role,
}

/// Result of token verification.
///
/// `error` distinguishes expired from malformed tokens for logging only;
/// the route boundary maps both to the same generic unauthorized response.
#[derive(Debug, Default)]
pub struct TokenValidationResult {
    pub valid: bool,
    pub claims: Option<Claims>,
    pub error: Option<String>,
}

/// Issues and verifies tokens with a shared HS256 secret.
#[derive(Clone)]
pub struct JwtValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    expiry_seconds: u64,
}

impl JwtValidator {
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self, TownhallError> {
        if secret.is_empty() {
            return Err(TownhallError::Internal("JWT secret must not be empty".into()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            expiry_seconds,
        })
    }

    pub fn generate_token(&self, input: TokenInput) -> Result<String, TownhallError> {
        let iat = unix_now();
        let claims = Claims {
            sub: input.user_id,
            role: input.role,
            iat,
            exp: iat + self.expiry_seconds,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| TownhallError::Internal(format!("failed to sign token: {e}")))
    }

    pub fn verify_token(&self, token: &str) -> TokenValidationResult {
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => TokenValidationResult {
                valid: true,
                claims: Some(data.claims),
                error: None,
            },
            Err(e) => {
                let reason = match e.kind() {
                    ErrorKind::ExpiredSignature => "token expired",
                    _ => "invalid token",
                };
                TokenValidationResult {
                    valid: false,
                    claims: None,
                    error: Some(reason.to_string()),
                }
            }
        }
    }
}

/// Extract a bearer token from an Authorization header value.
pub fn extract_token_from_header(header: Option<&str>) -> Option<&str> {
    header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(expiry: u64) -> JwtValidator {
        JwtValidator::new("test-secret".into(), expiry).unwrap()
    }

    #[test]
    fn roundtrip_preserves_subject_and_role() {
        let jwt = validator(3600);
        let token = jwt
            .generate_token(TokenInput {
                user_id: "64f000000000000000000001".into(),
                role: Role::Admin,
            })
            .unwrap();

        let result = jwt.verify_token(&token);
        assert!(result.valid);
        let claims = result.claims.unwrap();
        assert_eq!(claims.sub, "64f000000000000000000001");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp, claims.iat + 3600);
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = validator(1);
        let token = jwt
            .generate_token(TokenInput {
                user_id: "64f000000000000000000001".into(),
                role: Role::Citizen,
            })
            .unwrap();

        std::thread::sleep(std::time::Duration::from_secs(2));

        let result = jwt.verify_token(&token);
        assert!(!result.valid);
        assert_eq!(result.error.as_deref(), Some("token expired"));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let jwt = validator(3600);
        let token = jwt
            .generate_token(TokenInput {
                user_id: "64f000000000000000000001".into(),
                role: Role::Citizen,
            })
            .unwrap();

        let mut tampered = token.clone();
        tampered.push('x');
        assert!(!jwt.verify_token(&tampered).valid);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let jwt = validator(3600);
        let other = JwtValidator::new("other-secret".into(), 3600).unwrap();
        let token = jwt
            .generate_token(TokenInput {
                user_id: "64f000000000000000000001".into(),
                role: Role::Citizen,
            })
            .unwrap();

        assert!(!other.verify_token(&token).valid);
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(JwtValidator::new(String::new(), 3600).is_err());
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(
            extract_token_from_header(Some("Bearer abc.def.ghi")),
            Some("abc.def.ghi")
        );
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);
        assert_eq!(extract_token_from_header(Some("Basic abc")), None);
        assert_eq!(extract_token_from_header(None), None);
    }
}
