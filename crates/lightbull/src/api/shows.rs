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

//! The show graph routes: shows, visuals, groups, parameters, links and the
//! current selection.
//!
//! Every mutation follows the same shape: take the collection lock, change
//! the graph, map the result and capture a show snapshot, drop the lock, then
//! publish the change on the event hub. The lock is therefore released
//! before the broadcast goes out; a fast follow-up read may observe the new
//! state before other subscribers hear about it, which is fine.

use std::str::FromStr;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::{mapper, ApiError, AppState, ConnectionId, RequireAuth};
use crate::{
    events::{EventTopic, ShowSnapshot},
    shows::{effects::EffectKind, parameters::Parameter, ShowError},
};

fn payload<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

#[derive(Debug, Serialize)]
struct ShowsResponse {
    shows: Vec<mapper::ShowSummary>,
}

/// `GET /api/shows`
pub async fn list_shows(State(state): State<AppState>) -> Json<impl Serialize> {
    let shows = state.shows.read();

    Json(ShowsResponse {
        shows: shows.shows().iter().map(mapper::show_summary).collect(),
    })
}

#[derive(Debug, Deserialize)]
pub struct CreateShowRequest {
    name: String,
    #[serde(default)]
    favorite: bool,
}

/// `POST /api/shows`
pub async fn create_show(
    State(state): State<AppState>,
    _auth: RequireAuth,
    ConnectionId(origin): ConnectionId,
    Json(request): Json<CreateShowRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (summary, snapshot) = {
        let mut shows = state.shows.write();
        let show = shows.new_show(&request.name, request.favorite)?;

        (mapper::show_summary(show), ShowSnapshot::of(show))
    };

    state
        .hub
        .publish_new(
            EventTopic::ShowAdded,
            payload(&summary),
            Some(snapshot),
            origin,
        )
        .await;

    Ok((StatusCode::CREATED, Json(summary)))
}

/// `GET /api/shows/{id}`
pub async fn show_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<mapper::ShowDetails>, ApiError> {
    let shows = state.shows.read();
    let show = shows.find_show(&id).ok_or(ApiError::NotFound)?;

    Ok(Json(mapper::show_details(show)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateShowRequest {
    name: Option<String>,
    favorite: bool,
}

/// `PUT /api/shows/{id}`
pub async fn update_show(
    State(state): State<AppState>,
    _auth: RequireAuth,
    ConnectionId(origin): ConnectionId,
    Path(id): Path<String>,
    Json(request): Json<UpdateShowRequest>,
) -> Result<Json<mapper::ShowSummary>, ApiError> {
    let (summary, snapshot) = {
        let mut shows = state.shows.write();
        let show = shows.find_show_mut(&id).ok_or(ApiError::NotFound)?;

        if let Some(name) = &request.name {
            show.set_name(name)?;
        }
        show.set_favorite(request.favorite);

        (mapper::show_summary(show), ShowSnapshot::of(show))
    };

    state
        .hub
        .publish_new(
            EventTopic::ShowChanged,
            payload(&summary),
            Some(snapshot),
            origin,
        )
        .await;

    Ok(Json(summary))
}

/// `DELETE /api/shows/{id}`
pub async fn delete_show(
    State(state): State<AppState>,
    _auth: RequireAuth,
    ConnectionId(origin): ConnectionId,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (summary, snapshot) = {
        let mut shows = state.shows.write();
        let show = shows.find_show(&id).ok_or(ApiError::NotFound)?;
        let show_id = show.id();
        let summary = mapper::show_summary(show);
        let snapshot = ShowSnapshot::of(show);

        shows.delete_show(show_id);

        (summary, snapshot)
    };

    state
        .hub
        .publish_new(
            EventTopic::ShowDeleted,
            payload(&summary),
            Some(snapshot),
            origin,
        )
        .await;

    Ok(Json(json!({})))
}

#[derive(Debug, Serialize)]
struct VisualsResponse {
    visuals: Vec<mapper::VisualSummary>,
}

/// `GET /api/visuals`: every visual across all shows.
pub async fn list_visuals(State(state): State<AppState>) -> Json<impl Serialize> {
    let shows = state.shows.read();

    let visuals = shows
        .shows()
        .iter()
        .flat_map(|show| {
            show.visuals()
                .iter()
                .map(move |visual| mapper::visual_summary(show, visual))
        })
        .collect();

    Json(VisualsResponse { visuals })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVisualRequest {
    name: String,
    show_id: String,
}

/// `POST /api/visuals`
pub async fn create_visual(
    State(state): State<AppState>,
    _auth: RequireAuth,
    ConnectionId(origin): ConnectionId,
    Json(request): Json<CreateVisualRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (summary, snapshot) = {
        let mut shows = state.shows.write();
        let show = shows.find_show_mut(&request.show_id).ok_or(ApiError::NotFound)?;
        let visual_id = show.new_visual(&request.name).id();

        let show = &*show;
        let visual = show.find_visual(visual_id).ok_or(ApiError::NotFound)?;

        (mapper::visual_summary(show, visual), ShowSnapshot::of(show))
    };

    state
        .hub
        .publish_new(
            EventTopic::VisualAdded,
            payload(&summary),
            Some(snapshot),
            origin,
        )
        .await;

    Ok((StatusCode::CREATED, Json(summary)))
}

/// `GET /api/visuals/{id}`
pub async fn visual_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<mapper::VisualDetails>, ApiError> {
    let shows = state.shows.read();
    let (show, visual) = shows.find_visual(&id).ok_or(ApiError::NotFound)?;

    Ok(Json(mapper::visual_details(show, visual)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateVisualRequest {
    name: Option<String>,
}

/// `PUT /api/visuals/{id}`
pub async fn update_visual(
    State(state): State<AppState>,
    _auth: RequireAuth,
    ConnectionId(origin): ConnectionId,
    Path(id): Path<String>,
    Json(request): Json<UpdateVisualRequest>,
) -> Result<Json<mapper::VisualSummary>, ApiError> {
    let (summary, snapshot) = {
        let mut shows = state.shows.write();
        let (show_id, visual_id) = shows.locate_visual(&id).ok_or(ApiError::NotFound)?;

        if let Some(name) = &request.name {
            shows
                .show_by_id_mut(show_id)
                .and_then(|show| show.find_visual_mut(visual_id))
                .ok_or(ApiError::NotFound)?
                .set_name(name);
        }

        let (show, visual) = shows.find_visual(&id).ok_or(ApiError::NotFound)?;

        (mapper::visual_summary(show, visual), ShowSnapshot::of(show))
    };

    state
        .hub
        .publish_new(
            EventTopic::VisualChanged,
            payload(&summary),
            Some(snapshot),
            origin,
        )
        .await;

    Ok(Json(summary))
}

/// `DELETE /api/visuals/{id}`
pub async fn delete_visual(
    State(state): State<AppState>,
    _auth: RequireAuth,
    ConnectionId(origin): ConnectionId,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (event_payload, snapshot) = {
        let mut shows = state.shows.write();
        let (show_id, visual_id) = shows.locate_visual(&id).ok_or(ApiError::NotFound)?;

        shows.delete_visual(show_id, visual_id);

        let show = shows.show_by_id(show_id).ok_or(ApiError::NotFound)?;

        (
            json!({ "id": visual_id, "showId": show_id }),
            ShowSnapshot::of(show),
        )
    };

    state
        .hub
        .publish_new(
            EventTopic::VisualDeleted,
            event_payload,
            Some(snapshot),
            origin,
        )
        .await;

    Ok(Json(json!({})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    visual_id: String,
    parts: Vec<String>,
    effect_type: String,
}

/// `POST /api/groups`
pub async fn create_group(
    State(state): State<AppState>,
    _auth: RequireAuth,
    ConnectionId(origin): ConnectionId,
    Json(request): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_effect_kind(&request.effect_type)?;
    validate_parts(&state, &request.parts)?;

    let (details, snapshot) = {
        let mut shows = state.shows.write();
        let (show_id, visual_id) = shows
            .locate_visual(&request.visual_id)
            .ok_or(ApiError::NotFound)?;

        let visual = shows
            .show_by_id_mut(show_id)
            .and_then(|show| show.find_visual_mut(visual_id))
            .ok_or(ApiError::NotFound)?;
        let details = mapper::group_details(visual.new_group(request.parts.clone(), kind));

        let show = shows.show_by_id(show_id).ok_or(ApiError::NotFound)?;

        (details, ShowSnapshot::of(show))
    };

    state
        .hub
        .publish_new(
            EventTopic::GroupAdded,
            payload(&details),
            Some(snapshot),
            origin,
        )
        .await;

    Ok((StatusCode::CREATED, Json(details)))
}

/// `GET /api/groups/{id}`
pub async fn group_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<mapper::GroupDetails>, ApiError> {
    let shows = state.shows.read();
    let (_show, _visual, group) = shows.find_group(&id).ok_or(ApiError::NotFound)?;

    Ok(Json(mapper::group_details(group)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupRequest {
    parts: Option<Vec<String>>,
    effect_type: Option<String>,
}

/// `PUT /api/groups/{id}`
///
/// Changing the effect type replaces the effect instance wholesale; the old
/// parameter values and any links pointing into them are gone.
pub async fn update_group(
    State(state): State<AppState>,
    _auth: RequireAuth,
    ConnectionId(origin): ConnectionId,
    Path(id): Path<String>,
    Json(request): Json<UpdateGroupRequest>,
) -> Result<Json<mapper::GroupDetails>, ApiError> {
    let kind = request
        .effect_type
        .as_deref()
        .map(parse_effect_kind)
        .transpose()?;
    if let Some(parts) = &request.parts {
        validate_parts(&state, parts)?;
    }

    let (details, snapshot) = {
        let mut shows = state.shows.write();
        let (show_id, visual_id, group_id) =
            shows.locate_group(&id).ok_or(ApiError::NotFound)?;

        {
            let visual = shows
                .show_by_id_mut(show_id)
                .and_then(|show| show.find_visual_mut(visual_id))
                .ok_or(ApiError::NotFound)?;

            if let Some(parts) = request.parts.clone() {
                visual
                    .find_group_mut(group_id)
                    .ok_or(ApiError::NotFound)?
                    .set_parts(parts);
            }
            if let Some(kind) = kind {
                // Replacing the effect also unlinks every parameter that
                // pointed into the old one.
                if !visual.set_group_effect(group_id, kind) {
                    return Err(ApiError::NotFound);
                }
            }
        }

        let (show, _visual, group) = shows.find_group(&id).ok_or(ApiError::NotFound)?;

        (mapper::group_details(group), ShowSnapshot::of(show))
    };

    state
        .hub
        .publish_new(
            EventTopic::GroupChanged,
            payload(&details),
            Some(snapshot),
            origin,
        )
        .await;

    Ok(Json(details))
}

/// `DELETE /api/groups/{id}`
pub async fn delete_group(
    State(state): State<AppState>,
    _auth: RequireAuth,
    ConnectionId(origin): ConnectionId,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (event_payload, snapshot) = {
        let mut shows = state.shows.write();
        let (show_id, visual_id, group_id) =
            shows.locate_group(&id).ok_or(ApiError::NotFound)?;

        shows
            .show_by_id_mut(show_id)
            .and_then(|show| show.find_visual_mut(visual_id))
            .ok_or(ApiError::NotFound)?
            .delete_group(group_id);

        let show = shows.show_by_id(show_id).ok_or(ApiError::NotFound)?;

        (
            json!({ "id": group_id, "visualId": visual_id, "showId": show_id }),
            ShowSnapshot::of(show),
        )
    };

    state
        .hub
        .publish_new(
            EventTopic::GroupDeleted,
            event_payload,
            Some(snapshot),
            origin,
        )
        .await;

    Ok(Json(json!({})))
}

/// `GET /api/parameters/{id}`
pub async fn parameter_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Parameter>, ApiError> {
    let shows = state.shows.read();
    let (_show, _visual, _group, parameter) =
        shows.find_parameter(&id).ok_or(ApiError::NotFound)?;

    Ok(Json(parameter.clone()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateParameterRequest {
    current: Option<serde_json::Value>,
    default: Option<serde_json::Value>,
}

/// `PUT /api/parameters/{id}`: partial update of the current and default
/// values, propagated through the link closure.
///
/// A change that touches the default value is durable and published as
/// `parameter_default_changed`; a current-only change is a live knob turn
/// and published as `parameter_changed`, which persistence ignores.
pub async fn update_parameter(
    State(state): State<AppState>,
    _auth: RequireAuth,
    ConnectionId(origin): ConnectionId,
    Path(id): Path<String>,
    Json(request): Json<UpdateParameterRequest>,
) -> Result<Json<Parameter>, ApiError> {
    let (parameter, snapshot) = {
        let mut shows = state.shows.write();
        let (show_id, visual_id, _group_id, parameter_id) =
            shows.locate_parameter(&id).ok_or(ApiError::NotFound)?;

        let visual = shows
            .show_by_id_mut(show_id)
            .and_then(|show| show.find_visual_mut(visual_id))
            .ok_or(ApiError::NotFound)?;

        if let Some(raw) = &request.current {
            visual.set_parameter_current(parameter_id, raw)?;
        }
        if let Some(raw) = &request.default {
            visual.set_parameter_default(parameter_id, raw)?;
        }

        let parameter = visual
            .find_parameter(parameter_id)
            .ok_or(ApiError::NotFound)?
            .clone();
        let show = shows.show_by_id(show_id).ok_or(ApiError::NotFound)?;

        (parameter, ShowSnapshot::of(show))
    };

    let topic = if request.default.is_some() {
        Some(EventTopic::ParameterDefaultChanged)
    } else if request.current.is_some() {
        Some(EventTopic::ParameterChanged)
    } else {
        None
    };

    if let Some(topic) = topic {
        state
            .hub
            .publish_new(topic, payload(&parameter), Some(snapshot), origin)
            .await;
    }

    Ok(Json(parameter))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    linked_parameter: String,
}

/// `POST /api/parameters/{id}/links`
pub async fn create_link(
    State(state): State<AppState>,
    _auth: RequireAuth,
    ConnectionId(origin): ConnectionId,
    Path(id): Path<String>,
    Json(request): Json<CreateLinkRequest>,
) -> Result<Json<Parameter>, ApiError> {
    let (parameter, snapshot) = {
        let mut shows = state.shows.write();
        let (show_id, visual_id, _group_id, parameter_id) =
            shows.locate_parameter(&id).ok_or(ApiError::NotFound)?;
        let (_, linked_visual_id, _, linked_id) = shows
            .locate_parameter(&request.linked_parameter)
            .ok_or(ApiError::NotFound)?;

        if linked_visual_id != visual_id {
            return Err(ShowError::LinkDifferentVisual.into());
        }

        let visual = shows
            .show_by_id_mut(show_id)
            .and_then(|show| show.find_visual_mut(visual_id))
            .ok_or(ApiError::NotFound)?;

        visual.link_parameters(parameter_id, linked_id)?;

        let parameter = visual
            .find_parameter(parameter_id)
            .ok_or(ApiError::NotFound)?
            .clone();
        let show = shows.show_by_id(show_id).ok_or(ApiError::NotFound)?;

        (parameter, ShowSnapshot::of(show))
    };

    state
        .hub
        .publish_new(
            EventTopic::ParameterLinksChanged,
            payload(&parameter),
            Some(snapshot),
            origin,
        )
        .await;

    Ok(Json(parameter))
}

/// `DELETE /api/parameters/{id}/links/{linked_id}`
pub async fn delete_link(
    State(state): State<AppState>,
    _auth: RequireAuth,
    ConnectionId(origin): ConnectionId,
    Path((id, linked_id)): Path<(String, String)>,
) -> Result<Json<Parameter>, ApiError> {
    let linked_id = Uuid::from_str(&linked_id).map_err(|_| ApiError::NotFound)?;

    let (parameter, snapshot) = {
        let mut shows = state.shows.write();
        let (show_id, visual_id, _group_id, parameter_id) =
            shows.locate_parameter(&id).ok_or(ApiError::NotFound)?;

        let visual = shows
            .show_by_id_mut(show_id)
            .and_then(|show| show.find_visual_mut(visual_id))
            .ok_or(ApiError::NotFound)?;

        visual.unlink_parameters(parameter_id, linked_id);

        let parameter = visual
            .find_parameter(parameter_id)
            .ok_or(ApiError::NotFound)?
            .clone();
        let show = shows.show_by_id(show_id).ok_or(ApiError::NotFound)?;

        (parameter, ShowSnapshot::of(show))
    };

    state
        .hub
        .publish_new(
            EventTopic::ParameterLinksChanged,
            payload(&parameter),
            Some(snapshot),
            origin,
        )
        .await;

    Ok(Json(parameter))
}

/// `GET /api/current`
pub async fn current(State(state): State<AppState>) -> Json<mapper::CurrentSelection> {
    let shows = state.shows.read();
    let (show, visual) = shows.current();

    Json(mapper::current_selection(show, visual))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCurrentRequest {
    #[serde(default)]
    show_id: Option<String>,
    #[serde(default)]
    visual_id: Option<String>,
}

/// `PUT /api/current`: change the selection the render loop plays.
///
/// Empty strings count as absent, so a client can select a show while
/// explicitly clearing the visual.
pub async fn update_current(
    State(state): State<AppState>,
    _auth: RequireAuth,
    ConnectionId(origin): ConnectionId,
    Json(request): Json<UpdateCurrentRequest>,
) -> Result<Json<mapper::CurrentSelection>, ApiError> {
    let show_id = parse_optional_id(request.show_id)?;
    let visual_id = parse_optional_id(request.visual_id)?;

    let selection = {
        let mut shows = state.shows.write();
        shows.set_current(show_id, visual_id)?;

        let (show, visual) = shows.current();
        mapper::current_selection(show, visual)
    };

    state
        .hub
        .publish_new(EventTopic::CurrentChanged, payload(&selection), None, origin)
        .await;

    Ok(Json(selection))
}

/// `DELETE /api/current`: stop playing the current visual, keeping the show
/// selected.
pub async fn clear_current(
    State(state): State<AppState>,
    _auth: RequireAuth,
    ConnectionId(origin): ConnectionId,
) -> Result<Json<mapper::CurrentSelection>, ApiError> {
    let selection = {
        let mut shows = state.shows.write();
        shows.clear_current_visual();

        let (show, visual) = shows.current();
        mapper::current_selection(show, visual)
    };

    state
        .hub
        .publish_new(EventTopic::CurrentChanged, payload(&selection), None, origin)
        .await;

    Ok(Json(selection))
}

fn parse_effect_kind(effect_type: &str) -> Result<EffectKind, ApiError> {
    EffectKind::from_str(effect_type)
        .map_err(|_| ApiError::BadRequest("Unknown effect".to_owned()))
}

fn parse_optional_id(id: Option<String>) -> Result<Option<Uuid>, ApiError> {
    match id.filter(|id| !id.is_empty()) {
        Some(id) => Uuid::from_str(&id).map(Some).map_err(|_| ApiError::NotFound),
        None => Ok(None),
    }
}

fn validate_parts(state: &AppState, parts: &[String]) -> Result<(), ApiError> {
    let leds = state.hardware.leds();

    for part in parts {
        if !leds.has_part(part) {
            return Err(ApiError::BadRequest(format!("Unknown LED part: {part}")));
        }
    }

    Ok(())
}
