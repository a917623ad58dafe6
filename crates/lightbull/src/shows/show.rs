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

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{visual::Visual, ShowError};

/// An ordered collection of visuals, the unit of persistence and navigation.
#[derive(Debug, Serialize, Deserialize)]
pub struct Show {
    id: Uuid,
    name: String,
    favorite: bool,
    visuals: Vec<Visual>,
}

impl Show {
    pub(crate) fn new(name: &str, favorite: bool) -> Result<Self, ShowError> {
        if name.is_empty() {
            return Err(ShowError::InvalidName);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            favorite,
            visuals: Vec::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), ShowError> {
        if name.is_empty() {
            return Err(ShowError::InvalidName);
        }

        self.name = name.to_owned();

        Ok(())
    }

    pub fn favorite(&self) -> bool {
        self.favorite
    }

    pub fn set_favorite(&mut self, favorite: bool) {
        self.favorite = favorite;
    }

    pub fn visuals(&self) -> &[Visual] {
        &self.visuals
    }

    /// Add a new, empty visual to the show.
    pub fn new_visual(&mut self, name: &str) -> &Visual {
        self.visuals.push(Visual::new(name));

        self.visuals.last().expect("the visual was just pushed")
    }

    pub fn delete_visual(&mut self, id: Uuid) -> bool {
        let len = self.visuals.len();
        self.visuals.retain(|visual| visual.id() != id);

        self.visuals.len() != len
    }

    pub fn has_visual(&self, id: Uuid) -> bool {
        self.visuals.iter().any(|visual| visual.id() == id)
    }

    pub fn find_visual(&self, id: Uuid) -> Option<&Visual> {
        self.visuals.iter().find(|visual| visual.id() == id)
    }

    pub fn find_visual_mut(&mut self, id: Uuid) -> Option<&mut Visual> {
        self.visuals.iter_mut().find(|visual| visual.id() == id)
    }
}
