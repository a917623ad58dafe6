// Copyright (c) 2024 Damir Jelić
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use std::{str::FromStr, sync::Arc};

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::{
    events::EventHub,
    hardware::Hardware,
    persistence::Persistence,
    shows::{parameters::ParameterError, ShowCollection, ShowError},
};

pub mod auth;
pub mod config;
pub mod jwt;
pub mod mapper;
pub mod shows;
pub mod system;
pub mod ws;

pub use jwt::{JwtError, JwtManager};

/// Everything the request handlers need, shared across the whole API.
#[derive(Debug, Clone)]
pub struct AppState {
    pub shows: Arc<ShowCollection>,
    pub hub: EventHub,
    pub persistence: Arc<Persistence>,
    pub jwt: Arc<JwtManager>,
    pub hardware: Arc<Hardware>,
    /// bcrypt hash of the operator password. Empty disables authentication.
    pub auth_hash: String,
}

/// The error surface of the REST API: every error becomes
/// `{"error": <message>}` with a matching status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Invalid or unknown ID")]
    NotFound,
    #[error("Authentication required")]
    Unauthorized,
    #[error("Invalid password")]
    InvalidPassword,
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized | ApiError::InvalidPassword => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<ShowError> for ApiError {
    fn from(error: ShowError) -> Self {
        match error {
            ShowError::ShowNotFound
            | ShowError::VisualNotFound
            | ShowError::ParameterNotFound => ApiError::NotFound,
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<ParameterError> for ApiError {
    fn from(error: ParameterError) -> Self {
        ApiError::BadRequest(error.to_string())
    }
}

/// Extractor gating the mutating routes on a valid bearer token.
///
/// With no password configured the controller is open and the gate lets
/// everything through.
#[derive(Debug)]
pub struct RequireAuth;

#[async_trait]
impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if state.auth_hash.is_empty() {
            return Ok(RequireAuth);
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        match token {
            Some(token) if state.jwt.check(token) => Ok(RequireAuth),
            _ => Err(ApiError::Unauthorized),
        }
    }
}

/// The optional `X-Lightbull-Connection-Id` header carrying the originating
/// websocket connection of a mutation, so the broadcast can identify the
/// origin.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionId(pub Option<Uuid>);

pub const CONNECTION_ID_HEADER: &str = "x-lightbull-connection-id";

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ConnectionId {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(CONNECTION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::from_str(value).ok());

        Ok(ConnectionId(id))
    }
}

/// Assemble the full API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/auth", post(auth::login))
        .route("/api/config", get(config::configuration))
        .route("/api/config/parts", get(config::parts))
        .route("/api/shows", get(shows::list_shows).post(shows::create_show))
        .route(
            "/api/shows/:id",
            get(shows::show_details)
                .put(shows::update_show)
                .delete(shows::delete_show),
        )
        .route(
            "/api/visuals",
            get(shows::list_visuals).post(shows::create_visual),
        )
        .route(
            "/api/visuals/:id",
            get(shows::visual_details)
                .put(shows::update_visual)
                .delete(shows::delete_visual),
        )
        .route("/api/groups", post(shows::create_group))
        .route(
            "/api/groups/:id",
            get(shows::group_details)
                .put(shows::update_group)
                .delete(shows::delete_group),
        )
        .route(
            "/api/parameters/:id",
            get(shows::parameter_details).put(shows::update_parameter),
        )
        .route("/api/parameters/:id/links", post(shows::create_link))
        .route(
            "/api/parameters/:id/links/:linked_id",
            axum::routing::delete(shows::delete_link),
        )
        .route(
            "/api/current",
            get(shows::current)
                .put(shows::update_current)
                .delete(shows::clear_current),
        )
        .route(
            "/api/ethernet",
            get(system::ethernet).put(system::update_ethernet),
        )
        .route("/api/shutdown", post(system::shutdown))
        .route("/api/ws", get(ws::upgrade))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
