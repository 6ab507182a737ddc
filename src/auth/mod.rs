//! Authentication and authorization for Townhall
//!
//! Provides:
//! - JWT token generation and validation
//! - Password hashing with Argon2
//! - Account roles and the request authorization gate

pub mod gate;
pub mod jwt;
pub mod password;
pub mod roles;

pub use gate::{authenticate, require_admin};
pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenInput, TokenValidationResult};
pub use password::{hash_password, validate_password, verify_password};
pub use roles::Role;
