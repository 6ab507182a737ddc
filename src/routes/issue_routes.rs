//! HTTP routes for citizen-facing issues
//!
//! - POST   /api/issues                      [auth]  - report an issue
//! - GET    /api/issues                      [public] - list all issues
//! - GET    /api/issues/category/{category}  [public] - filter by category
//! - POST   /api/issues/{id}/upvote          [auth]  - toggle own upvote
//! - DELETE /api/issues/{id}                 [admin] - delete an issue

use bson::oid::ObjectId;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::auth::gate;
use crate::db::schemas::Category;
use crate::issues::NewIssue;
use crate::routes::{
    auth_header, cors_preflight, error_response, json_response, method_not_allowed,
    not_found_response, parse_json_body, BoxBody, IssueResponse,
};
use crate::server::AppState;
use crate::types::TownhallError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIssueRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Numbers or numeric strings; anything else normalizes to 0
    #[serde(default)]
    pub lat: Option<Value>,
    #[serde(default)]
    pub lng: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct IssueListResponse {
    pub issues: Vec<IssueResponse>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

/// Handle issue HTTP requests.
///
/// Returns Some(response) if the request was handled, None if it is not
/// an issue route.
pub async fn handle_issue_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path();
    let method = req.method().clone();

    if !path.starts_with("/api/issues") {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let path = path.split('?').next().unwrap_or(path).to_string();

    let response = match (method, path.as_str()) {
        (Method::POST, "/api/issues") => handle_create(req, state).await,
        (Method::GET, "/api/issues") => handle_list_all(state).await,

        (Method::GET, p) if p.starts_with("/api/issues/category/") => {
            handle_list_by_category(state, p).await
        }

        (Method::POST, p) if p.starts_with("/api/issues/") && p.ends_with("/upvote") => {
            handle_upvote(req, state, &path).await
        }

        (Method::DELETE, p) if p.starts_with("/api/issues/") => {
            handle_delete(req, state, &path).await
        }

        (_, "/api/issues") => method_not_allowed(),
        _ => not_found_response(&path),
    };

    Some(response)
}

/// POST /api/issues
async fn handle_create(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let header = auth_header(&req);
    let user = match gate::authenticate(&state.jwt, &state.registry, header.as_deref()).await {
        Ok(user) => user,
        Err(e) => return error_response(&e),
    };

    let body: CreateIssueRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    let input = NewIssue {
        title: body.title,
        description: body.description,
        category: body.category,
        priority: body.priority,
        image_url: body.image_url,
        lat: body.lat,
        lng: body.lng,
    };

    match state.issues.create(&user, input).await {
        Ok(issue) => json_response(StatusCode::CREATED, &IssueResponse::from(&issue)),
        Err(e) => error_response(&e),
    }
}

/// GET /api/issues
async fn handle_list_all(state: Arc<AppState>) -> Response<BoxBody> {
    match state.issues.list_all().await {
        Ok(issues) => json_response(
            StatusCode::OK,
            &IssueListResponse {
                issues: issues.iter().map(IssueResponse::from).collect(),
            },
        ),
        Err(e) => error_response(&e),
    }
}

/// GET /api/issues/category/{category}
async fn handle_list_by_category(state: Arc<AppState>, path: &str) -> Response<BoxBody> {
    let segment = path
        .strip_prefix("/api/issues/category/")
        .unwrap_or_default();

    let decoded = match urlencoding::decode(segment) {
        Ok(s) => s,
        Err(_) => {
            return error_response(&TownhallError::InvalidArgument(
                "malformed category".into(),
            ))
        }
    };

    let category: Category = match decoded.parse() {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };

    match state.issues.list_by_category(category).await {
        Ok(issues) => json_response(
            StatusCode::OK,
            &IssueListResponse {
                issues: issues.iter().map(IssueResponse::from).collect(),
            },
        ),
        Err(e) => error_response(&e),
    }
}

/// POST /api/issues/{id}/upvote
async fn handle_upvote(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<BoxBody> {
    let header = auth_header(&req);
    let user = match gate::authenticate(&state.jwt, &state.registry, header.as_deref()).await {
        Ok(user) => user,
        Err(e) => return error_response(&e),
    };

    let issue_id = match issue_id_from(path, "/api/issues/", Some("/upvote")) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    let user_id = match user._id {
        Some(id) => id,
        None => {
            return error_response(&TownhallError::Internal("account has no id".into()))
        }
    };

    match state.issues.toggle_upvote(user_id, &issue_id).await {
        Ok(issue) => json_response(StatusCode::OK, &IssueResponse::from(&issue)),
        Err(e) => error_response(&e),
    }
}

/// DELETE /api/issues/{id} - admin only
async fn handle_delete(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<BoxBody> {
    let header = auth_header(&req);
    let user = match gate::authenticate(&state.jwt, &state.registry, header.as_deref()).await {
        Ok(user) => user,
        Err(e) => return error_response(&e),
    };

    let issue_id = match issue_id_from(path, "/api/issues/", None) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    match state.issues.remove(&user, &issue_id).await {
        Ok(()) => json_response(StatusCode::OK, &DeletedResponse { deleted: true }),
        Err(e) => error_response(&e),
    }
}

/// Pull an ObjectId path parameter out of `{prefix}{id}{suffix}`
pub(crate) fn issue_id_from(
    path: &str,
    prefix: &str,
    suffix: Option<&str>,
) -> Result<ObjectId, TownhallError> {
    let rest = path
        .strip_prefix(prefix)
        .ok_or_else(|| TownhallError::InvalidArgument("malformed path".into()))?;

    let raw = match suffix {
        Some(suffix) => rest
            .strip_suffix(suffix)
            .ok_or_else(|| TownhallError::InvalidArgument("malformed path".into()))?,
        None => rest,
    };

    if raw.is_empty() || raw.contains('/') {
        return Err(TownhallError::InvalidArgument("malformed path".into()));
    }

    ObjectId::parse_str(raw)
        .map_err(|_| TownhallError::InvalidArgument(format!("invalid issue id: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_id_between_prefix_and_suffix() {
        let id = ObjectId::new();
        let path = format!("/api/issues/{}/upvote", id.to_hex());
        assert_eq!(
            issue_id_from(&path, "/api/issues/", Some("/upvote")).unwrap(),
            id
        );
    }

    #[test]
    fn extracts_trailing_id() {
        let id = ObjectId::new();
        let path = format!("/api/issues/{}", id.to_hex());
        assert_eq!(issue_id_from(&path, "/api/issues/", None).unwrap(), id);
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(issue_id_from("/api/issues/not-an-id", "/api/issues/", None).is_err());
        assert!(issue_id_from("/api/issues/", "/api/issues/", None).is_err());
        assert!(issue_id_from("/api/issues/a/b", "/api/issues/", None).is_err());
    }
}
