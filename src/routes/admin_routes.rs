//! HTTP routes for admin triage
//!
//! Every route here authenticates and requires the admin role before
//! dispatch:
//! - GET    /api/admin/users                     - list accounts
//! - GET    /api/admin/issues                    - list all issues
//! - PUT    /api/admin/issues/status/{id}        - set lifecycle status
//! - PUT    /api/admin/issues/assign/{id}        - assign to staff
//! - DELETE /api/admin/issues/{id}               - delete an issue
//! - GET    /api/admin/stats                     - headline counts
//! - GET    /api/admin/stats/extended            - chart and heatmap data

use bson::oid::ObjectId;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::analytics::{CategoryCount, HeatmapPoint, MonthCount, PriorityCount};
use crate::auth::gate;
use crate::db::schemas::{Category, Status};
use crate::routes::issue_routes::issue_id_from;
use crate::routes::{
    auth_header, cors_preflight, error_response, json_response, method_not_allowed,
    not_found_response, parse_json_body, BoxBody, IssueResponse, UserResponse,
};
use crate::server::AppState;
use crate::types::TownhallError;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub staff_id: String,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
}

#[derive(Debug, Serialize)]
pub struct AdminIssueListResponse {
    pub issues: Vec<IssueResponse>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total: u64,
    pub pending: u64,
    pub solved: u64,
    pub most_upvoted_category: Option<Category>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedStatsResponse {
    pub issues_per_category: Vec<CategoryCount>,
    pub issues_per_priority: Vec<PriorityCount>,
    pub solved_per_month: Vec<MonthCount>,
    pub heatmap: Vec<HeatmapPoint>,
}

/// Handle admin HTTP requests.
///
/// Returns Some(response) if the request was handled, None if it is not
/// an admin route.
pub async fn handle_admin_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path();
    let method = req.method().clone();

    if !path.starts_with("/api/admin") {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let path = path.split('?').next().unwrap_or(path).to_string();

    // One gate for the whole admin surface
    let header = auth_header(&req);
    let admin = match gate::authenticate(&state.jwt, &state.registry, header.as_deref()).await {
        Ok(user) => user,
        Err(e) => return Some(error_response(&e)),
    };
    if let Err(e) = gate::require_admin(&admin) {
        return Some(error_response(&e));
    }

    let response = match (method, path.as_str()) {
        (Method::GET, "/api/admin/users") => handle_list_users(state).await,
        (Method::GET, "/api/admin/issues") => handle_list_issues(state).await,

        (Method::PUT, p) if p.starts_with("/api/admin/issues/status/") => {
            handle_update_status(req, state, &admin, &path).await
        }
        (Method::PUT, p) if p.starts_with("/api/admin/issues/assign/") => {
            handle_assign(req, state, &admin, &path).await
        }
        (Method::DELETE, p) if p.starts_with("/api/admin/issues/") => {
            handle_delete(state, &admin, &path).await
        }

        (Method::GET, "/api/admin/stats") => handle_stats(state).await,
        (Method::GET, "/api/admin/stats/extended") => handle_extended_stats(state).await,

        (_, "/api/admin/users") | (_, "/api/admin/issues") | (_, "/api/admin/stats") => {
            method_not_allowed()
        }

        _ => not_found_response(&path),
    };

    Some(response)
}

/// GET /api/admin/users
async fn handle_list_users(state: Arc<AppState>) -> Response<BoxBody> {
    match state.registry.list().await {
        Ok(users) => json_response(
            StatusCode::OK,
            &UserListResponse {
                users: users.iter().map(UserResponse::from).collect(),
            },
        ),
        Err(e) => error_response(&e),
    }
}

/// GET /api/admin/issues
async fn handle_list_issues(state: Arc<AppState>) -> Response<BoxBody> {
    match state.issues.list_all().await {
        Ok(issues) => json_response(
            StatusCode::OK,
            &AdminIssueListResponse {
                issues: issues.iter().map(IssueResponse::from).collect(),
            },
        ),
        Err(e) => error_response(&e),
    }
}

/// PUT /api/admin/issues/status/{id}
async fn handle_update_status(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    admin: &crate::db::schemas::UserDoc,
    path: &str,
) -> Response<BoxBody> {
    let issue_id = match issue_id_from(path, "/api/admin/issues/status/", None) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    let body: UpdateStatusRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    // Parse before any write: an invalid status never touches the store
    let status: Status = match body.status.parse() {
        Ok(s) => s,
        Err(e) => return error_response(&e),
    };

    match state.issues.set_status(admin, &issue_id, status).await {
        Ok(issue) => json_response(StatusCode::OK, &IssueResponse::from(&issue)),
        Err(e) => error_response(&e),
    }
}

/// PUT /api/admin/issues/assign/{id}
async fn handle_assign(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    admin: &crate::db::schemas::UserDoc,
    path: &str,
) -> Response<BoxBody> {
    let issue_id = match issue_id_from(path, "/api/admin/issues/assign/", None) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    let body: AssignRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    let staff_id = match ObjectId::parse_str(&body.staff_id) {
        Ok(id) => id,
        Err(_) => {
            return error_response(&TownhallError::InvalidArgument(format!(
                "invalid staff id: {}",
                body.staff_id
            )))
        }
    };

    match state.issues.assign(admin, &issue_id, &staff_id).await {
        Ok(issue) => json_response(StatusCode::OK, &IssueResponse::from(&issue)),
        Err(e) => error_response(&e),
    }
}

/// DELETE /api/admin/issues/{id}
async fn handle_delete(
    state: Arc<AppState>,
    admin: &crate::db::schemas::UserDoc,
    path: &str,
) -> Response<BoxBody> {
    let issue_id = match issue_id_from(path, "/api/admin/issues/", None) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    match state.issues.remove(admin, &issue_id).await {
        Ok(()) => json_response(StatusCode::OK, &DeletedResponse { deleted: true }),
        Err(e) => error_response(&e),
    }
}

/// GET /api/admin/stats
async fn handle_stats(state: Arc<AppState>) -> Response<BoxBody> {
    let counts = match state.analytics.counts().await {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };

    let most_upvoted_category = match state.analytics.most_upvoted_category().await {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };

    json_response(
        StatusCode::OK,
        &StatsResponse {
            total: counts.total,
            pending: counts.pending,
            solved: counts.solved,
            most_upvoted_category,
        },
    )
}

/// GET /api/admin/stats/extended
async fn handle_extended_stats(state: Arc<AppState>) -> Response<BoxBody> {
    let issues_per_category = match state.analytics.category_breakdown().await {
        Ok(v) => v,
        Err(e) => return error_response(&e),
    };
    let issues_per_priority = match state.analytics.priority_breakdown().await {
        Ok(v) => v,
        Err(e) => return error_response(&e),
    };
    let solved_per_month = match state.analytics.solved_by_month().await {
        Ok(v) => v,
        Err(e) => return error_response(&e),
    };
    let heatmap = match state.analytics.heatmap().await {
        Ok(v) => v,
        Err(e) => return error_response(&e),
    };

    json_response(
        StatusCode::OK,
        &ExtendedStatsResponse {
            issues_per_category,
            issues_per_priority,
            solved_per_month,
            heatmap,
        },
    )
}
