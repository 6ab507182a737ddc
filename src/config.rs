//! Configuration for Townhall
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Townhall - civic issue reporting and triage API
#[derive(Parser, Debug, Clone)]
#[command(name = "townhall")]
#[command(about = "Civic issue reporting and triage API")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "townhall")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds (default 7 days)
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "604800")]
    pub jwt_expiry_seconds: u64,

    /// Maximum number of admin accounts that may exist at once
    #[arg(long, env = "MAX_ADMINS", default_value = "2")]
    pub max_admins: u32,

    /// Comma-separated list of emails allowed to register as admin
    #[arg(long, env = "ALLOWED_ADMINS")]
    pub allowed_admins: Option<String>,

    /// Enable development mode (insecure default JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> String {
        if self.dev_mode {
            self.jwt_secret
                .clone()
                .unwrap_or_else(|| "dev-only-insecure-secret".to_string())
        } else {
            self.jwt_secret
                .clone()
                .expect("JWT_SECRET is required in production mode")
        }
    }

    /// Parsed admin allow-list, trimmed and lowercased.
    /// Empty when ALLOWED_ADMINS is unset, meaning no admin signups at all.
    pub fn admin_allowlist(&self) -> Vec<String> {
        self.allowed_admins
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if self.max_admins == 0 {
            return Err("MAX_ADMINS must be at least 1".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args(list: Option<&str>) -> Args {
        Args {
            node_id: Uuid::new_v4(),
            listen: "127.0.0.1:8080".parse().unwrap(),
            mongodb_uri: "mongodb://localhost:27017".into(),
            mongodb_db: "townhall".into(),
            jwt_secret: Some("secret".into()),
            jwt_expiry_seconds: 604800,
            max_admins: 2,
            allowed_admins: list.map(String::from),
            dev_mode: false,
            log_level: "info".into(),
        }
    }

    #[test]
    fn allowlist_is_trimmed_and_lowercased() {
        let args = base_args(Some(" Mayor@City.gov , clerk@city.gov ,"));
        assert_eq!(
            args.admin_allowlist(),
            vec!["mayor@city.gov".to_string(), "clerk@city.gov".to_string()]
        );
    }

    #[test]
    fn allowlist_empty_when_unset() {
        let args = base_args(None);
        assert!(args.admin_allowlist().is_empty());
    }

    #[test]
    fn validate_requires_jwt_secret_in_production() {
        let mut args = base_args(None);
        args.jwt_secret = None;
        assert!(args.validate().is_err());

        args.dev_mode = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_admin_ceiling() {
        let mut args = base_args(None);
        args.max_admins = 0;
        assert!(args.validate().is_err());
    }
}
