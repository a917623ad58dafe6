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

//! The wire shapes of the REST and websocket payloads.
//!
//! Handlers map the internal show graph onto these owned structs while the
//! collection lock is held, then serialize and publish after the lock is
//! gone.

use serde::Serialize;
use uuid::Uuid;

use crate::shows::{
    effects::{self, EffectKind},
    parameters::Parameter,
    Group, Show, Visual,
};

/// `{id, name, favorite, visualIds}`, the short representation of a show.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowSummary {
    pub id: Uuid,
    pub name: String,
    pub favorite: bool,
    pub visual_ids: Vec<Uuid>,
}

pub fn show_summary(show: &Show) -> ShowSummary {
    ShowSummary {
        id: show.id(),
        name: show.name().to_owned(),
        favorite: show.favorite(),
        visual_ids: show.visuals().iter().map(Visual::id).collect(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VisualRef {
    pub id: Uuid,
    pub name: String,
}

/// A show with its visuals listed by id and name.
#[derive(Debug, Clone, Serialize)]
pub struct ShowDetails {
    pub id: Uuid,
    pub name: String,
    pub favorite: bool,
    pub visuals: Vec<VisualRef>,
}

pub fn show_details(show: &Show) -> ShowDetails {
    ShowDetails {
        id: show.id(),
        name: show.name().to_owned(),
        favorite: show.favorite(),
        visuals: show
            .visuals()
            .iter()
            .map(|visual| VisualRef {
                id: visual.id(),
                name: visual.name().to_owned(),
            })
            .collect(),
    }
}

/// A visual in a cross-show listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualSummary {
    pub id: Uuid,
    pub name: String,
    pub show_id: Uuid,
}

pub fn visual_summary(show: &Show, visual: &Visual) -> VisualSummary {
    VisualSummary {
        id: visual.id(),
        name: visual.name().to_owned(),
        show_id: show.id(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualDetails {
    pub id: Uuid,
    pub name: String,
    pub show_id: Uuid,
    pub groups: Vec<GroupDetails>,
}

pub fn visual_details(show: &Show, visual: &Visual) -> VisualDetails {
    VisualDetails {
        id: visual.id(),
        name: visual.name().to_owned(),
        show_id: show.id(),
        groups: visual.groups().iter().map(group_details).collect(),
    }
}

/// An effect with its display name, as the API reports it. The persisted
/// form drops the name since it is derivable from the type.
#[derive(Debug, Clone, Serialize)]
pub struct EffectDetails {
    #[serde(rename = "type")]
    pub kind: EffectKind,
    pub name: &'static str,
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupDetails {
    pub id: Uuid,
    pub parts: Vec<String>,
    pub effect: EffectDetails,
}

pub fn group_details(group: &Group) -> GroupDetails {
    GroupDetails {
        id: group.id(),
        parts: group.parts().to_vec(),
        effect: EffectDetails {
            kind: group.effect().kind(),
            name: group.effect().name(),
            parameters: effects::to_json(group.effect()).parameters,
        },
    }
}

/// `{showId, visualId}`, both nullable.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSelection {
    pub show_id: Option<Uuid>,
    pub visual_id: Option<Uuid>,
}

pub fn current_selection(show: Option<&Show>, visual: Option<&Visual>) -> CurrentSelection {
    CurrentSelection {
        show_id: show.map(Show::id),
        visual_id: visual.map(Visual::id),
    }
}
