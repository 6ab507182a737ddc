//! Seed the initial admin account
//!
//! Goes through the normal admission path, so the allow-list and the
//! admin pool ceiling both still apply: the seed email must be present
//! in ALLOWED_ADMINS. Idempotent when the account already exists.
//!
//! Required env: SEED_ADMIN_EMAIL, SEED_ADMIN_PASSWORD.
//! Optional env: SEED_ADMIN_NAME (default "Super Admin").

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use townhall::auth::Role;
use townhall::config::Args;
use townhall::db::MongoClient;
use townhall::registry::{AccountRegistry, NewAccount};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seed_admin=info,townhall=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let email =
        std::env::var("SEED_ADMIN_EMAIL").context("SEED_ADMIN_EMAIL must be set")?;
    let password =
        std::env::var("SEED_ADMIN_PASSWORD").context("SEED_ADMIN_PASSWORD must be set")?;
    let name =
        std::env::var("SEED_ADMIN_NAME").unwrap_or_else(|_| "Super Admin".to_string());

    if !args
        .admin_allowlist()
        .contains(&email.trim().to_lowercase())
    {
        bail!("{email} is not in ALLOWED_ADMINS; add it before seeding");
    }

    let mongo = MongoClient::new(&args.mongodb_uri, &args.mongodb_db)
        .await
        .context("MongoDB connection failed")?;

    let registry = AccountRegistry::new(&mongo, args.max_admins, args.admin_allowlist())
        .await
        .context("failed to open account registry")?;

    if registry.find_by_email(&email).await?.is_some() {
        info!("Admin already exists: {}", email);
        return Ok(());
    }

    let admin = registry
        .register(NewAccount {
            name,
            email: email.clone(),
            password,
            requested_role: Some(Role::Admin),
        })
        .await
        .context("admin registration failed")?;

    info!("Seeded admin {} ({})", admin.email, admin.id_hex());
    Ok(())
}
