//! HTTP routes for Townhall
//!
//! Shared response plumbing lives here; each route area has its own
//! module with a prefix router returning `Some(response)` when it
//! handled the request.

pub mod admin_routes;
pub mod analytics_routes;
pub mod auth_routes;
pub mod health;
pub mod issue_routes;

pub use admin_routes::handle_admin_request;
pub use analytics_routes::handle_analytics_request;
pub use auth_routes::handle_auth_request;
pub use health::{health_check, version_info};
pub use issue_routes::handle_issue_request;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::db::schemas::{IssueDoc, UserDoc};
use crate::types::TownhallError;

pub(crate) type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Error body shape: `{"error": ..., "code": ...}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Account view safe for responses: no credential hash
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: crate::auth::Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<&UserDoc> for UserResponse {
    fn from(user: &UserDoc) -> Self {
        Self {
            id: user.id_hex(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: user
                .metadata
                .created_at
                .map(|at| at.to_chrono().to_rfc3339()),
        }
    }
}

/// Full issue view
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: crate::db::schemas::Category,
    pub priority: crate::db::schemas::Priority,
    pub image_url: String,
    pub location: crate::db::schemas::GeoPoint,
    pub upvotes: Vec<String>,
    pub upvote_count: usize,
    pub created_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    pub status: crate::db::schemas::Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl From<&IssueDoc> for IssueResponse {
    fn from(issue: &IssueDoc) -> Self {
        Self {
            id: issue.id_hex(),
            title: issue.title.clone(),
            description: issue.description.clone(),
            category: issue.category,
            priority: issue.priority,
            image_url: issue.image_url.clone(),
            location: issue.location.clone(),
            upvotes: issue.upvotes.iter().map(|id| id.to_hex()).collect(),
            upvote_count: issue.upvotes.len(),
            created_by: issue.created_by.to_hex(),
            assigned_to: issue.assigned_to.map(|id| id.to_hex()),
            status: issue.status,
            created_at: issue
                .metadata
                .created_at
                .map(|at| at.to_chrono().to_rfc3339()),
            updated_at: issue
                .metadata
                .updated_at
                .map(|at| at.to_chrono().to_rfc3339()),
        }
    }
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(full_body(json))
        .unwrap()
}

/// Uniform error mapping for the whole API
pub(crate) fn error_response(err: &TownhallError) -> Response<BoxBody> {
    json_response(
        err.status_code(),
        &ErrorResponse {
            error: err.to_string(),
            code: Some(err.code().to_string()),
        },
    )
}

pub(crate) fn not_found_response(path: &str) -> Response<BoxBody> {
    json_response(
        StatusCode::NOT_FOUND,
        &ErrorResponse {
            error: format!("no route for {path}"),
            code: None,
        },
    )
}

pub(crate) fn method_not_allowed() -> Response<BoxBody> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &ErrorResponse {
            error: "method not allowed".into(),
            code: None,
        },
    )
}

pub(crate) fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "86400")
        .body(empty_body())
        .unwrap()
}

pub(crate) fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub(crate) fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

/// Read and deserialize a JSON body, with a small size cap
pub(crate) async fn parse_json_body<T: for<'de> Deserialize<'de>>(
    req: Request<hyper::body::Incoming>,
) -> Result<T, TownhallError> {
    let body = req
        .collect()
        .await
        .map_err(|e| TownhallError::InvalidArgument(format!("failed to read body: {e}")))?;

    let bytes = body.to_bytes();
    if bytes.len() > 10240 {
        return Err(TownhallError::InvalidArgument(
            "request body too large".into(),
        ));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| TownhallError::InvalidArgument(format!("invalid JSON: {e}")))
}

/// Authorization header, owned so handlers can consume the request after
pub(crate) fn auth_header(req: &Request<hyper::body::Incoming>) -> Option<String> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
