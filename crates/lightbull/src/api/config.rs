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

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::Serialize;

use super::AppState;
use crate::shows::effects;

#[derive(Debug, Serialize)]
struct ConfigResponse {
    parts: Vec<String>,
    effects: BTreeMap<String, &'static str>,
    features: Vec<&'static str>,
}

/// `GET /api/config`: the static facts a client needs to drive the
/// controller, part names, available effects and optional features.
pub async fn configuration(State(state): State<AppState>) -> Json<impl Serialize> {
    let parts = state.hardware.leds().parts().to_vec();

    let effects = effects::effect_names()
        .into_iter()
        .map(|(kind, name)| (kind.to_string(), name))
        .collect();

    let mut features = Vec::new();
    if state.hardware.system().is_managed() {
        features.push("ethernet");
    }

    Json(ConfigResponse {
        parts,
        effects,
        features,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PartResponse {
    name: String,
    led_count: usize,
}

#[derive(Debug, Serialize)]
struct PartsResponse {
    parts: Vec<PartResponse>,
}

/// `GET /api/config/parts`: every part with its LED count.
pub async fn parts(State(state): State<AppState>) -> Json<impl Serialize> {
    let leds = state.hardware.leds();

    let parts = leds
        .parts()
        .iter()
        .map(|name| PartResponse {
            name: name.clone(),
            led_count: leds.num_leds(name),
        })
        .collect();

    Json(PartsResponse { parts })
}
