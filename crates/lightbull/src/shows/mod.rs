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

use std::{str::FromStr, time::Duration};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::hardware::LedStrip;

pub mod effects;
pub mod group;
pub mod parameters;
pub mod show;
pub mod visual;

pub use group::Group;
pub use show::Show;
pub use visual::Visual;

use parameters::{Parameter, ParameterError};

#[derive(Debug, thiserror::Error)]
pub enum ShowError {
    #[error("invalid show name")]
    InvalidName,
    #[error("invalid or unknown show ID")]
    ShowNotFound,
    #[error("invalid or unknown visual ID")]
    VisualNotFound,
    #[error("invalid or unknown parameter ID")]
    ParameterNotFound,
    #[error("a parameter cannot be linked to itself")]
    LinkSameParameter,
    #[error("linked parameters need to have the same type")]
    LinkTypeMismatch,
    #[error("linked parameters need to belong to the same visual")]
    LinkDifferentVisual,
    #[error("the visual does not belong to the show")]
    VisualNotInShow,
    #[error("visual or show required")]
    SelectionRequired,
    #[error(transparent)]
    Parameter(#[from] ParameterError),
}

/// All loaded shows plus the current selection, behind one coarse lock.
///
/// Mutating callers and the render loop take the write side; the render loop
/// holds it for exactly one frame so a mutation can delay a frame but never
/// tear one.
#[derive(Debug, Default)]
pub struct ShowCollection {
    state: RwLock<ShowState>,
}

impl ShowCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, ShowState> {
        self.state.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, ShowState> {
        self.state.write()
    }
}

/// The data behind the collection lock: the shows themselves and the
/// `(current show, current visual)` pair.
///
/// Entities are referenced by id everywhere; the lookups are linear scans,
/// which is fine at the scale of dozens of shows with a handful of visuals
/// each.
#[derive(Debug, Default)]
pub struct ShowState {
    shows: Vec<Show>,
    current_show: Option<Uuid>,
    current_visual: Option<Uuid>,
}

impl ShowState {
    pub fn shows(&self) -> &[Show] {
        &self.shows
    }

    /// Create a new show with the given name.
    pub fn new_show(&mut self, name: &str, favorite: bool) -> Result<&Show, ShowError> {
        let show = Show::new(name, favorite)?;
        self.shows.push(show);

        Ok(self.shows.last().expect("the show was just pushed"))
    }

    /// Add an already existing show, used when loading from disk.
    pub fn append_show(&mut self, show: Show) {
        self.shows.push(show);
    }

    /// Remove a show. The current selection is cleared when it pointed into
    /// the removed show.
    pub fn delete_show(&mut self, id: Uuid) -> Option<Show> {
        let pos = self.shows.iter().position(|show| show.id() == id)?;

        if self.current_show == Some(id) {
            self.current_show = None;
            self.current_visual = None;
        }

        Some(self.shows.remove(pos))
    }

    /// Remove a visual from its show. The current visual is cleared when it
    /// was the removed one.
    pub fn delete_visual(&mut self, show_id: Uuid, visual_id: Uuid) -> bool {
        let Some(show) = self.show_by_id_mut(show_id) else {
            return false;
        };

        let deleted = show.delete_visual(visual_id);

        if deleted && self.current_visual == Some(visual_id) {
            self.current_visual = None;
        }

        deleted
    }

    pub fn show_by_id(&self, id: Uuid) -> Option<&Show> {
        self.shows.iter().find(|show| show.id() == id)
    }

    pub fn show_by_id_mut(&mut self, id: Uuid) -> Option<&mut Show> {
        self.shows.iter_mut().find(|show| show.id() == id)
    }

    /// Find a show by its string id. Returns `None` for malformed ids just
    /// like for unknown ones.
    pub fn find_show(&self, id: &str) -> Option<&Show> {
        self.show_by_id(Uuid::from_str(id).ok()?)
    }

    pub fn find_show_mut(&mut self, id: &str) -> Option<&mut Show> {
        self.show_by_id_mut(Uuid::from_str(id).ok()?)
    }

    /// Find a visual and its owning show by the visual's string id.
    pub fn find_visual(&self, id: &str) -> Option<(&Show, &Visual)> {
        let id = Uuid::from_str(id).ok()?;

        self.shows.iter().find_map(|show| {
            show.find_visual(id).map(|visual| (show, visual))
        })
    }

    /// Find a group and its owning show and visual by the group's string id.
    pub fn find_group(&self, id: &str) -> Option<(&Show, &Visual, &Group)> {
        let id = Uuid::from_str(id).ok()?;

        self.shows.iter().find_map(|show| {
            show.visuals().iter().find_map(|visual| {
                visual.find_group(id).map(|group| (show, visual, group))
            })
        })
    }

    /// Find a parameter and its owning show, visual and group by the
    /// parameter's string id.
    pub fn find_parameter(&self, id: &str) -> Option<(&Show, &Visual, &Group, &Parameter)> {
        let id = Uuid::from_str(id).ok()?;

        self.shows.iter().find_map(|show| {
            show.visuals().iter().find_map(|visual| {
                visual.groups().iter().find_map(|group| {
                    group
                        .effect()
                        .parameters()
                        .into_iter()
                        .find(|parameter| parameter.id() == id)
                        .map(|parameter| (show, visual, group, parameter))
                })
            })
        })
    }

    /// The ids of the show and visual owning the given visual id.
    pub fn locate_visual(&self, id: &str) -> Option<(Uuid, Uuid)> {
        self.find_visual(id)
            .map(|(show, visual)| (show.id(), visual.id()))
    }

    /// The ids of the show, visual and group owning the given group id.
    pub fn locate_group(&self, id: &str) -> Option<(Uuid, Uuid, Uuid)> {
        self.find_group(id)
            .map(|(show, visual, group)| (show.id(), visual.id(), group.id()))
    }

    /// The ids of the show, visual, group and parameter owning the given
    /// parameter id.
    pub fn locate_parameter(&self, id: &str) -> Option<(Uuid, Uuid, Uuid, Uuid)> {
        self.find_parameter(id).map(|(show, visual, group, parameter)| {
            (show.id(), visual.id(), group.id(), parameter.id())
        })
    }

    /// The currently selected show and visual.
    pub fn current(&self) -> (Option<&Show>, Option<&Visual>) {
        let show = self.current_show.and_then(|id| self.show_by_id(id));
        let visual = self
            .current_visual
            .and_then(|id| show.and_then(|show| show.find_visual(id)));

        (show, visual)
    }

    /// Change the current selection.
    ///
    /// Passing a show selects it (and optionally one of its visuals),
    /// passing only a visual moves the selection within the current show,
    /// passing neither is an error. Selecting a show without a visual clears
    /// the visual.
    pub fn set_current(
        &mut self,
        show: Option<Uuid>,
        visual: Option<Uuid>,
    ) -> Result<(), ShowError> {
        match (show, visual) {
            (Some(show), Some(visual)) => {
                if !self
                    .show_by_id(show)
                    .ok_or(ShowError::ShowNotFound)?
                    .has_visual(visual)
                {
                    return Err(ShowError::VisualNotInShow);
                }

                self.current_show = Some(show);
                self.current_visual = Some(visual);
            }
            (Some(show), None) => {
                if self.show_by_id(show).is_none() {
                    return Err(ShowError::ShowNotFound);
                }

                self.current_show = Some(show);
                self.current_visual = None;
            }
            (None, Some(visual)) => {
                let current_show = self.current_show.ok_or(ShowError::SelectionRequired)?;

                if !self
                    .show_by_id(current_show)
                    .ok_or(ShowError::ShowNotFound)?
                    .has_visual(visual)
                {
                    return Err(ShowError::VisualNotInShow);
                }

                self.current_visual = Some(visual);
            }
            (None, None) => return Err(ShowError::SelectionRequired),
        }

        Ok(())
    }

    /// Clear the current visual, keeping the current show.
    pub fn clear_current_visual(&mut self) {
        self.current_visual = None;
    }

    /// Draw one frame of the current visual, or darkness when nothing is
    /// selected.
    pub fn render_frame(&mut self, leds: &mut LedStrip, delta: Duration) {
        if let (Some(show_id), Some(visual_id)) = (self.current_show, self.current_visual) {
            if let Some(visual) = self
                .show_by_id_mut(show_id)
                .and_then(|show| show.find_visual_mut(visual_id))
            {
                visual.update(leds, delta);
                return;
            }
        }

        leds.set_color_all(0, 0, 0);
    }
}

#[cfg(test)]
mod test {
    use similar_asserts::assert_eq;

    use super::*;
    use crate::{
        hardware::{leds::test::test_strip, Rgb},
        shows::effects::EffectKind,
    };

    fn state_with_show() -> (ShowState, Uuid, Uuid) {
        let mut state = ShowState::default();

        let show_id = state
            .new_show("Festival", false)
            .expect("We should be able to create a show")
            .id();
        let visual_id = state
            .show_by_id_mut(show_id)
            .unwrap()
            .new_visual("Warmup")
            .id();

        (state, show_id, visual_id)
    }

    #[test]
    fn selection_with_show_and_visual() {
        let (mut state, show_id, visual_id) = state_with_show();

        state
            .set_current(Some(show_id), Some(visual_id))
            .expect("We should be able to select a show and one of its visuals");

        let (show, visual) = state.current();
        assert_eq!(show.unwrap().id(), show_id);
        assert_eq!(visual.unwrap().id(), visual_id);
    }

    #[test]
    fn selection_with_show_clears_the_visual() {
        let (mut state, show_id, visual_id) = state_with_show();
        state.set_current(Some(show_id), Some(visual_id)).unwrap();

        state
            .set_current(Some(show_id), None)
            .expect("We should be able to select a show on its own");

        let (show, visual) = state.current();
        assert_eq!(show.unwrap().id(), show_id);
        assert!(visual.is_none(), "Selecting a show should clear the visual");
    }

    #[test]
    fn selection_with_visual_needs_a_current_show() {
        let (mut state, show_id, visual_id) = state_with_show();

        state
            .set_current(None, Some(visual_id))
            .expect_err("A visual-only selection without a current show should fail");

        state.set_current(Some(show_id), None).unwrap();
        state
            .set_current(None, Some(visual_id))
            .expect("A visual-only selection should work once a show is current");

        let foreign_visual = Uuid::new_v4();
        state
            .set_current(None, Some(foreign_visual))
            .expect_err("A visual outside of the current show should be rejected");
    }

    #[test]
    fn selection_needs_something() {
        let (mut state, _, _) = state_with_show();

        assert!(matches!(
            state.set_current(None, None),
            Err(ShowError::SelectionRequired)
        ));
    }

    #[test]
    fn selection_rejects_foreign_visuals() {
        let (mut state, show_id, _) = state_with_show();
        let other_show = state.new_show("Other", false).unwrap().id();
        let other_visual = state
            .show_by_id_mut(other_show)
            .unwrap()
            .new_visual("Other visual")
            .id();

        assert!(matches!(
            state.set_current(Some(show_id), Some(other_visual)),
            Err(ShowError::VisualNotInShow)
        ));
    }

    #[test]
    fn deleting_the_current_show_clears_the_selection() {
        let (mut state, show_id, visual_id) = state_with_show();
        state.set_current(Some(show_id), Some(visual_id)).unwrap();

        state
            .delete_show(show_id)
            .expect("We should be able to delete the show");

        let (show, visual) = state.current();
        assert!(show.is_none());
        assert!(visual.is_none());
    }

    #[test]
    fn deleting_the_current_visual_clears_it() {
        let (mut state, show_id, visual_id) = state_with_show();
        state.set_current(Some(show_id), Some(visual_id)).unwrap();

        assert!(state.delete_visual(show_id, visual_id));

        let (show, visual) = state.current();
        assert_eq!(
            show.unwrap().id(),
            show_id,
            "Deleting the current visual should keep the show selected"
        );
        assert!(visual.is_none());
    }

    #[test]
    fn lookups_tolerate_malformed_ids() {
        let (state, _, _) = state_with_show();

        assert!(state.find_show("not-a-uuid").is_none());
        assert!(state.find_visual("not-a-uuid").is_none());
        assert!(state.find_group("not-a-uuid").is_none());
        assert!(state.find_parameter("not-a-uuid").is_none());
        assert!(state.find_show(&Uuid::new_v4().to_string()).is_none());
    }

    #[test]
    fn parameter_lookup_walks_the_whole_tree() {
        let (mut state, show_id, visual_id) = state_with_show();

        let parameter_id = {
            let visual = state
                .show_by_id_mut(show_id)
                .unwrap()
                .find_visual_mut(visual_id)
                .unwrap();
            let group = visual.new_group(vec!["head_left".to_owned()], EffectKind::SingleColor);
            group.effect().parameters()[0].id()
        };

        let (show, visual, _, parameter) = state
            .find_parameter(&parameter_id.to_string())
            .expect("We should be able to find a parameter by id");

        assert_eq!(show.id(), show_id);
        assert_eq!(visual.id(), visual_id);
        assert_eq!(parameter.key(), "color");
    }

    #[test]
    fn rendering_without_a_selection_clears_the_strip() {
        let (mut state, show_id, visual_id) = state_with_show();
        let mut strip = test_strip(100);
        strip.set_color_all(9, 9, 9);

        state.render_frame(&mut strip, Duration::from_millis(40));
        assert_eq!(
            strip.get_color("head_left", 0),
            Rgb::default(),
            "Without a current visual the strip should go dark"
        );

        // With a current visual the groups draw.
        {
            let visual = state
                .show_by_id_mut(show_id)
                .unwrap()
                .find_visual_mut(visual_id)
                .unwrap();
            let group = visual.new_group(vec!["head_left".to_owned()], EffectKind::SingleColor);
            let parameter_id = group.effect().parameters()[0].id();
            visual
                .set_parameter_current(
                    parameter_id,
                    &serde_json::json!({"r": 255, "g": 0, "b": 0}),
                )
                .unwrap();
        }
        state.set_current(Some(show_id), Some(visual_id)).unwrap();

        state.render_frame(&mut strip, Duration::from_millis(40));
        assert_eq!(strip.get_color("head_left", 0), Rgb { r: 255, g: 0, b: 0 });
    }
}
