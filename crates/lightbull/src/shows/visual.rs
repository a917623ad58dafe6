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

use std::{
    collections::{HashSet, VecDeque},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{effects::EffectKind, group::Group, parameters::{Parameter, Value}, ShowError};
use crate::hardware::LedStrip;

/// One arrangement of effects across the LED parts, the unit an operator can
/// make current.
///
/// The visual owns its groups and with them every parameter, which makes it
/// the natural home of the parameter linking machinery: links are stored as
/// peer ids on the parameters and resolved through the visual on use.
#[derive(Debug, Serialize, Deserialize)]
pub struct Visual {
    id: Uuid,
    name: String,
    groups: Vec<Group>,
}

impl Visual {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            groups: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_owned();
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Add a new group binding a fresh effect of the given kind to the given
    /// parts.
    pub fn new_group(&mut self, parts: Vec<String>, kind: EffectKind) -> &Group {
        self.groups.push(Group::new(parts, kind));

        self.groups.last().expect("the group was just pushed")
    }

    pub fn delete_group(&mut self, id: Uuid) -> bool {
        let len = self.groups.len();
        self.groups.retain(|group| group.id() != id);

        self.groups.len() != len
    }

    pub fn find_group(&self, id: Uuid) -> Option<&Group> {
        self.groups.iter().find(|group| group.id() == id)
    }

    pub fn find_group_mut(&mut self, id: Uuid) -> Option<&mut Group> {
        self.groups.iter_mut().find(|group| group.id() == id)
    }

    pub fn find_parameter(&self, id: Uuid) -> Option<&Parameter> {
        self.groups
            .iter()
            .flat_map(|group| group.effect().parameters())
            .find(|parameter| parameter.id() == id)
    }

    fn find_parameter_mut(&mut self, id: Uuid) -> Option<&mut Parameter> {
        self.groups
            .iter_mut()
            .flat_map(|group| group.effect_mut().parameters_mut())
            .find(|parameter| parameter.id() == id)
    }

    /// Set the current value of a parameter from raw JSON and push it to all
    /// linked parameters.
    pub fn set_parameter_current(
        &mut self,
        id: Uuid,
        raw: &serde_json::Value,
    ) -> Result<(), ShowError> {
        let value = self
            .find_parameter_mut(id)
            .ok_or(ShowError::ParameterNotFound)?
            .set_current_from_json(raw)?;

        self.propagate(id, Some(value), None);

        Ok(())
    }

    /// Set the default value of a parameter from raw JSON and push it to all
    /// linked parameters.
    pub fn set_parameter_default(
        &mut self,
        id: Uuid,
        raw: &serde_json::Value,
    ) -> Result<(), ShowError> {
        let value = self
            .find_parameter_mut(id)
            .ok_or(ShowError::ParameterNotFound)?
            .set_default_from_json(raw)?;

        self.propagate(id, None, Some(value));

        Ok(())
    }

    /// Link two parameters of this visual.
    ///
    /// Linking fails when the two ids are the same, when either parameter
    /// does not belong to this visual or when the types differ. On success
    /// the current and default values of the first parameter are pushed
    /// through the whole closure so all peers converge immediately.
    pub fn link_parameters(&mut self, first: Uuid, second: Uuid) -> Result<(), ShowError> {
        if first == second {
            return Err(ShowError::LinkSameParameter);
        }

        let first_parameter = self
            .find_parameter(first)
            .ok_or(ShowError::ParameterNotFound)?;
        let (current, default) = (first_parameter.current(), first_parameter.default());
        let first_type = first_parameter.param_type();

        let second_parameter = self
            .find_parameter(second)
            .ok_or(ShowError::ParameterNotFound)?;

        if first_type != second_parameter.param_type() {
            return Err(ShowError::LinkTypeMismatch);
        }

        self.find_parameter_mut(first)
            .expect("the first link parameter was just found")
            .add_link(second);
        self.find_parameter_mut(second)
            .expect("the second link parameter was just found")
            .add_link(first);

        self.propagate(first, Some(current), Some(default));

        Ok(())
    }

    /// Remove the link between two parameters. Removing a link that does not
    /// exist is fine.
    pub fn unlink_parameters(&mut self, first: Uuid, second: Uuid) {
        if let Some(parameter) = self.find_parameter_mut(first) {
            parameter.remove_link(second);
        }

        if let Some(parameter) = self.find_parameter_mut(second) {
            parameter.remove_link(first);
        }
    }

    /// Replace a group's effect with a fresh instance of the given kind.
    ///
    /// The old parameters disappear together with the old effect, and so
    /// must the links other parameters held into them: those are swept here
    /// so no surviving parameter keeps advertising a dead peer id. Returns
    /// false when the group does not belong to this visual.
    pub fn set_group_effect(&mut self, group_id: Uuid, kind: EffectKind) -> bool {
        let Some(group) = self.find_group_mut(group_id) else {
            return false;
        };

        let old_ids: Vec<Uuid> = group
            .effect()
            .parameters()
            .into_iter()
            .map(Parameter::id)
            .collect();

        group.set_effect(kind);

        for group in &mut self.groups {
            for parameter in group.effect_mut().parameters_mut() {
                for id in &old_ids {
                    parameter.remove_link(*id);
                }
            }
        }

        true
    }

    /// Every parameter reachable from `start` over link edges, including
    /// `start` itself.
    ///
    /// A plain breadth-first walk with a visited set, so link cycles
    /// terminate and no recursion depth is involved.
    fn link_closure(&self, start: Uuid) -> HashSet<Uuid> {
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);

        while let Some(id) = queue.pop_front() {
            let Some(parameter) = self.find_parameter(id) else {
                continue;
            };

            for &peer in parameter.links() {
                if visited.insert(peer) {
                    queue.push_back(peer);
                }
            }
        }

        visited
    }

    /// Assign the given value cells to every parameter in the link closure
    /// of `from`.
    fn propagate(&mut self, from: Uuid, current: Option<Value>, default: Option<Value>) {
        for id in self.link_closure(from) {
            if id == from {
                continue;
            }

            let Some(parameter) = self.find_parameter_mut(id) else {
                continue;
            };

            // Linked parameters always share a type, so these cannot fail
            // with values that just passed validation on the source.
            if let Some(value) = current {
                let _ = parameter.set_current(value);
            }
            if let Some(value) = default {
                let _ = parameter.set_default(value);
            }
        }
    }

    /// Draw one frame by letting every group draw onto its parts, in order.
    pub fn update(&mut self, leds: &mut LedStrip, delta: Duration) {
        for group in &mut self.groups {
            group.update(leds, delta);
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use similar_asserts::assert_eq;

    use super::*;
    use crate::shows::parameters::{Color, ParameterType};

    fn visual_with_three_colors() -> (Visual, Uuid, Uuid, Uuid) {
        let mut visual = Visual::new("test");
        visual.new_group(vec!["a".to_owned()], EffectKind::SingleColor);
        visual.new_group(vec!["b".to_owned()], EffectKind::SingleColor);
        visual.new_group(vec!["c".to_owned()], EffectKind::Blink);

        let a = visual.groups()[0].effect().parameters()[0].id();
        let b = visual.groups()[1].effect().parameters()[0].id();
        // The primary color of the blink effect.
        let c = visual.groups()[2].effect().parameters()[0].id();

        (visual, a, b, c)
    }

    #[test]
    fn writes_propagate_through_the_closure() {
        let (mut visual, a, b, c) = visual_with_three_colors();

        visual
            .link_parameters(a, b)
            .expect("We should be able to link two color parameters");
        visual
            .link_parameters(b, c)
            .expect("We should be able to extend the chain");

        visual
            .set_parameter_current(c, &json!({"r": 1, "g": 2, "b": 3}))
            .expect("We should be able to write a linked parameter");

        let expected = Value::Color(Color { r: 1, g: 2, b: 3 });
        for id in [a, b, c] {
            assert_eq!(
                visual.find_parameter(id).unwrap().current(),
                expected,
                "The write should have reached every member of the closure"
            );
        }
    }

    #[test]
    fn linking_converges_current_and_default() {
        let (mut visual, a, b, _) = visual_with_three_colors();

        visual
            .set_parameter_current(a, &json!({"r": 9, "g": 9, "b": 9}))
            .expect("We should be able to set the first color");
        visual
            .set_parameter_default(b, &json!({"r": 4, "g": 4, "b": 4}))
            .expect("We should be able to set the second default");

        visual
            .link_parameters(a, b)
            .expect("We should be able to link the parameters");

        let b_parameter = visual.find_parameter(b).unwrap();
        assert_eq!(
            b_parameter.current(),
            Value::Color(Color { r: 9, g: 9, b: 9 }),
            "Linking should push the first parameter's current value"
        );
        assert_eq!(
            b_parameter.default(),
            Value::Color(Color::default()),
            "Linking should push the first parameter's default value"
        );
    }

    #[test]
    fn unlink_cuts_the_propagation() {
        let (mut visual, a, b, c) = visual_with_three_colors();

        visual.link_parameters(a, b).unwrap();
        visual.link_parameters(b, c).unwrap();
        visual.unlink_parameters(a, b);

        visual
            .set_parameter_current(a, &json!({"r": 7, "g": 0, "b": 0}))
            .expect("We should be able to write the unlinked parameter");

        assert_eq!(
            visual.find_parameter(a).unwrap().current(),
            Value::Color(Color { r: 7, g: 0, b: 0 })
        );
        assert_eq!(
            visual.find_parameter(b).unwrap().current(),
            Value::Color(Color::default()),
            "An unlinked parameter should not receive writes anymore"
        );

        // Unlinking twice is fine.
        visual.unlink_parameters(a, b);
    }

    #[test]
    fn link_cycles_terminate() {
        let (mut visual, a, b, c) = visual_with_three_colors();

        visual.link_parameters(a, b).unwrap();
        visual.link_parameters(b, c).unwrap();
        visual.link_parameters(c, a).unwrap();

        visual
            .set_parameter_current(b, &json!({"r": 5, "g": 5, "b": 5}))
            .expect("A write into a link cycle should terminate");

        for id in [a, b, c] {
            assert_eq!(
                visual.find_parameter(id).unwrap().current(),
                Value::Color(Color { r: 5, g: 5, b: 5 })
            );
        }
    }

    #[test]
    fn replacing_an_effect_sweeps_links_into_it() {
        let (mut visual, a, b, c) = visual_with_three_colors();

        visual.link_parameters(a, b).unwrap();
        visual.link_parameters(b, c).unwrap();

        let group_of_b = visual.groups()[1].id();
        assert!(
            visual.set_group_effect(group_of_b, EffectKind::Rainbow),
            "We should be able to replace the effect of an owned group"
        );

        assert!(visual.find_parameter(b).is_none(), "The old parameter is gone");
        assert!(
            !visual.find_parameter(a).unwrap().links().contains(&b),
            "A surviving parameter should not keep a link to the dead one"
        );
        assert!(!visual.find_parameter(c).unwrap().links().contains(&b));

        // Writing a member of the former closure terminates and only
        // reaches parameters that still exist.
        visual
            .set_parameter_current(a, &json!({"r": 3, "g": 3, "b": 3}))
            .expect("We should be able to write the surviving parameter");
        assert_eq!(
            visual.find_parameter(c).unwrap().current(),
            Value::Color(Color::default()),
            "The write should not travel over the removed link anymore"
        );

        assert!(
            !visual.set_group_effect(Uuid::new_v4(), EffectKind::Blink),
            "An unknown group should be reported as a miss"
        );
    }

    #[test]
    fn link_constraints() {
        let (mut visual, a, _, _) = visual_with_three_colors();

        assert!(matches!(
            visual.link_parameters(a, a),
            Err(ShowError::LinkSameParameter)
        ));

        // The speed parameter of the blink effect is a percentage.
        let speed = visual.groups()[2]
            .effect()
            .parameters()
            .into_iter()
            .find(|p| p.param_type() == ParameterType::Percent)
            .unwrap()
            .id();

        assert!(matches!(
            visual.link_parameters(a, speed),
            Err(ShowError::LinkTypeMismatch)
        ));

        assert!(matches!(
            visual.link_parameters(a, Uuid::new_v4()),
            Err(ShowError::ParameterNotFound)
        ));
    }
}
