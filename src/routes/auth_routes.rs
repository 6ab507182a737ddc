//! HTTP routes for authentication
//!
//! - POST /api/auth/signup - Create an account and get a JWT
//! - POST /api/auth/login  - Authenticate and get a JWT
//! - GET  /api/auth/me     - Current account from the token

use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{gate, JwtValidator, Role, TokenInput};
use crate::db::schemas::UserDoc;
use crate::registry::NewAccount;
use crate::routes::{
    auth_header, cors_preflight, error_response, json_response, method_not_allowed,
    not_found_response, parse_json_body, BoxBody, UserResponse,
};
use crate::server::AppState;
use crate::types::TownhallError;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
    pub expires_at: u64,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserResponse,
}

/// Handle auth-related HTTP requests.
///
/// Returns Some(response) if the request was handled, None if it is not
/// an auth route.
pub async fn handle_auth_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path();
    let method = req.method();

    if !path.starts_with("/api/auth") {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let path = path.split('?').next().unwrap_or(path).to_string();

    let response = match (method, path.as_str()) {
        (&Method::POST, "/api/auth/signup") => handle_signup(req, state).await,
        (&Method::POST, "/api/auth/login") => handle_login(req, state).await,
        (&Method::GET, "/api/auth/me") => handle_me(req, state).await,

        (_, "/api/auth/signup") | (_, "/api/auth/login") | (_, "/api/auth/me") => {
            method_not_allowed()
        }

        _ => not_found_response(&path),
    };

    Some(response)
}

/// POST /api/auth/signup
///
/// Admin signups must be allow-listed and win a pool slot; everyone else
/// is admitted as a citizen.
async fn handle_signup(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let body: SignupRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    let requested_role = match parse_role(body.role.as_deref()) {
        Ok(role) => role,
        Err(e) => return error_response(&e),
    };

    let account = NewAccount {
        name: body.name,
        email: body.email,
        password: body.password,
        requested_role,
    };

    match state.registry.register(account).await {
        Ok(user) => auth_success(&state.jwt, &user, StatusCode::CREATED),
        Err(e) => error_response(&e),
    }
}

/// POST /api/auth/login
async fn handle_login(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let body: LoginRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    let expected_role = match parse_role(body.role.as_deref()) {
        Ok(role) => role,
        Err(e) => return error_response(&e),
    };

    match state
        .registry
        .authenticate(&body.email, &body.password, expected_role)
        .await
    {
        Ok(user) => auth_success(&state.jwt, &user, StatusCode::OK),
        Err(e) => error_response(&e),
    }
}

/// GET /api/auth/me
async fn handle_me(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let header = auth_header(&req);
    match gate::authenticate(&state.jwt, &state.registry, header.as_deref()).await {
        Ok(user) => json_response(
            StatusCode::OK,
            &MeResponse {
                user: UserResponse::from(&user),
            },
        ),
        Err(e) => error_response(&e),
    }
}

fn parse_role(role: Option<&str>) -> Result<Option<Role>, TownhallError> {
    role.map(str::parse).transpose()
}

/// Issue a token for the account and build the auth payload
fn auth_success(jwt: &JwtValidator, user: &UserDoc, status: StatusCode) -> Response<BoxBody> {
    let input = TokenInput {
        user_id: user.id_hex(),
        role: user.role,
    };

    match jwt.generate_token(input) {
        Ok(token) => {
            let expires_at = jwt
                .verify_token(&token)
                .claims
                .map(|c| c.exp)
                .unwrap_or(0);

            json_response(
                status,
                &AuthResponse {
                    user: UserResponse::from(user),
                    token,
                    expires_at,
                },
            )
        }
        Err(e) => error_response(&e),
    }
}
