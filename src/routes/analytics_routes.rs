//! HTTP routes for shared analytics
//!
//! The reduced, citizen-visible read side. Any authenticated account may
//! read these; the full detail (most-upvoted category, heatmap) stays on
//! the admin stats routes.
//!
//! - GET /api/analytics/issues          - safe-field issue list
//! - GET /api/analytics/stats           - total/pending/solved
//! - GET /api/analytics/category-stats  - issues per category
//! - GET /api/analytics/solved-monthly  - monthly solved series

use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::analytics::{CategoryCount, IssueDigest, MonthCount};
use crate::auth::gate;
use crate::routes::{
    auth_header, cors_preflight, error_response, json_response, method_not_allowed,
    not_found_response, BoxBody,
};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct DigestResponse {
    pub issues: Vec<IssueDigest>,
}

#[derive(Debug, Serialize)]
pub struct CountsResponse {
    pub total: u64,
    pub pending: u64,
    pub solved: u64,
}

#[derive(Debug, Serialize)]
pub struct CategoryStatsResponse {
    pub categories: Vec<CategoryCount>,
}

#[derive(Debug, Serialize)]
pub struct SolvedMonthlyResponse {
    pub monthly: Vec<MonthCount>,
}

/// Handle analytics HTTP requests.
///
/// Returns Some(response) if the request was handled, None if it is not
/// an analytics route.
pub async fn handle_analytics_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path();
    let method = req.method().clone();

    if !path.starts_with("/api/analytics") {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let path = path.split('?').next().unwrap_or(path).to_string();

    // Any authenticated account may read the reduced analytics
    let header = auth_header(&req);
    if let Err(e) = gate::authenticate(&state.jwt, &state.registry, header.as_deref()).await {
        return Some(error_response(&e));
    }

    let response = match (method, path.as_str()) {
        (Method::GET, "/api/analytics/issues") => handle_issue_digest(state).await,
        (Method::GET, "/api/analytics/stats") => handle_counts(state).await,
        (Method::GET, "/api/analytics/category-stats") => handle_category_stats(state).await,
        (Method::GET, "/api/analytics/solved-monthly") => handle_solved_monthly(state).await,

        (_, "/api/analytics/issues")
        | (_, "/api/analytics/stats")
        | (_, "/api/analytics/category-stats")
        | (_, "/api/analytics/solved-monthly") => method_not_allowed(),

        _ => not_found_response(&path),
    };

    Some(response)
}

/// GET /api/analytics/issues
async fn handle_issue_digest(state: Arc<AppState>) -> Response<BoxBody> {
    match state.analytics.issue_digest().await {
        Ok(issues) => json_response(StatusCode::OK, &DigestResponse { issues }),
        Err(e) => error_response(&e),
    }
}

/// GET /api/analytics/stats
async fn handle_counts(state: Arc<AppState>) -> Response<BoxBody> {
    match state.analytics.counts().await {
        Ok(counts) => json_response(
            StatusCode::OK,
            &CountsResponse {
                total: counts.total,
                pending: counts.pending,
                solved: counts.solved,
            },
        ),
        Err(e) => error_response(&e),
    }
}

/// GET /api/analytics/category-stats
async fn handle_category_stats(state: Arc<AppState>) -> Response<BoxBody> {
    match state.analytics.category_breakdown().await {
        Ok(categories) => json_response(StatusCode::OK, &CategoryStatsResponse { categories }),
        Err(e) => error_response(&e),
    }
}

/// GET /api/analytics/solved-monthly
async fn handle_solved_monthly(state: Arc<AppState>) -> Response<BoxBody> {
    match state.analytics.solved_by_month().await {
        Ok(monthly) => json_response(StatusCode::OK, &SolvedMonthlyResponse { monthly }),
        Err(e) => error_response(&e),
    }
}
