//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one spawned task per connection, and
//! prefix dispatch into the per-area routers.

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::analytics::AnalyticsService;
use crate::auth::JwtValidator;
use crate::config::Args;
use crate::db::MongoClient;
use crate::issues::IssueService;
use crate::registry::AccountRegistry;
use crate::routes;
use crate::routes::BoxBody;
use crate::types::{Result, TownhallError};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub jwt: JwtValidator,
    pub registry: AccountRegistry,
    pub issues: IssueService,
    pub analytics: AnalyticsService,
}

impl AppState {
    /// Build the full service stack over one MongoDB connection.
    pub async fn new(args: Args, mongo: &MongoClient) -> Result<Self> {
        let jwt = JwtValidator::new(args.jwt_secret(), args.jwt_expiry_seconds)?;
        let registry =
            AccountRegistry::new(mongo, args.max_admins, args.admin_allowlist()).await?;
        let issues = IssueService::new(mongo).await?;
        let analytics = AnalyticsService::new(mongo).await?;

        Ok(Self {
            args,
            jwt,
            registry,
            issues,
            analytics,
        })
    }
}

/// Accept loop
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Townhall listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - using insecure default JWT secret");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    // Prefix routers consume the request when they match
    if path.starts_with("/api/auth") {
        if let Some(response) = routes::handle_auth_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(routes::not_found_response(&path));
    }

    if path.starts_with("/api/admin") {
        if let Some(response) = routes::handle_admin_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(routes::not_found_response(&path));
    }

    if path.starts_with("/api/analytics") {
        if let Some(response) = routes::handle_analytics_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(routes::not_found_response(&path));
    }

    if path.starts_with("/api/issues") {
        if let Some(response) = routes::handle_issue_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(routes::not_found_response(&path));
    }

    let response = match (method, path.as_str()) {
        // Liveness probe
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }

        // Version info for deployment verification
        (Method::GET, "/version") => routes::version_info(),

        // CORS preflight
        (Method::OPTIONS, _) => routes::cors_preflight(),

        _ => routes::error_response(&TownhallError::NotFound(format!("no route for {path}"))),
    };

    Ok(response)
}
