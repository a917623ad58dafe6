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

use axum::{extract::State, Json};
use serde_json::json;

use super::{ApiError, AppState, RequireAuth};
use crate::hardware::EthernetConfig;

/// `GET /api/ethernet`
pub async fn ethernet(State(state): State<AppState>) -> Json<EthernetConfig> {
    Json(state.hardware.system().ethernet_config())
}

/// `PUT /api/ethernet`: validate and apply a new network configuration.
///
/// Applying shells out to the `ip` tool, so the work runs on the blocking
/// pool instead of stalling the runtime.
pub async fn update_ethernet(
    State(state): State<AppState>,
    _auth: RequireAuth,
    Json(config): Json<EthernetConfig>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let result = tokio::task::spawn_blocking(move || {
        state
            .hardware
            .system()
            .set_ethernet_config(config, &state.persistence)
    })
    .await
    .map_err(|error| ApiError::Internal(error.to_string()))?;

    result.map_err(|error| ApiError::BadRequest(format!("Invalid data: {error}")))?;

    Ok(Json(json!({})))
}

/// `POST /api/shutdown`: power the controller off.
///
/// The response races the poweroff; whether it still reaches the client is
/// up to the kernel.
pub async fn shutdown(
    State(state): State<AppState>,
    _auth: RequireAuth,
) -> Json<serde_json::Value> {
    tokio::task::spawn_blocking(move || state.hardware.system().shutdown());

    Json(json!({}))
}
