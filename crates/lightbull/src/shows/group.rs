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

use std::time::Duration;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use super::effects::{self, Effect, EffectJson, EffectKind};
use crate::hardware::LedStrip;

/// The binding of one effect instance to a set of LED parts inside a visual.
#[derive(Debug)]
pub struct Group {
    id: Uuid,
    parts: Vec<String>,
    effect: Box<dyn Effect>,
}

impl Group {
    pub(crate) fn new(parts: Vec<String>, kind: EffectKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            parts,
            effect: effects::new_effect(kind),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The LED parts this group draws onto.
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn set_parts(&mut self, parts: Vec<String>) {
        self.parts = parts;
    }

    pub fn effect(&self) -> &dyn Effect {
        self.effect.as_ref()
    }

    pub fn effect_mut(&mut self) -> &mut dyn Effect {
        self.effect.as_mut()
    }

    /// Replace the effect with a fresh instance of the given kind.
    ///
    /// The previous parameter values are gone afterwards. Links other
    /// parameters held into the old effect are not touched here; use
    /// [`crate::shows::Visual::set_group_effect`], which sweeps them.
    pub(crate) fn set_effect(&mut self, kind: EffectKind) {
        self.effect = effects::new_effect(kind);
    }

    /// Draw one frame of the group's effect onto its parts.
    pub(crate) fn update(&mut self, leds: &mut LedStrip, delta: Duration) {
        // Parts can disappear from the configuration between boots while the
        // stored show still references them. Those are skipped instead of
        // taking down the render loop.
        let parts: Vec<&str> = self
            .parts
            .iter()
            .map(String::as_str)
            .filter(|part| leds.has_part(part))
            .collect();

        self.effect.update(leds, &parts, delta);
    }
}

#[derive(Serialize)]
struct GroupSer<'a> {
    id: Uuid,
    parts: &'a [String],
    effect: EffectJson,
}

#[derive(Deserialize)]
struct GroupDe {
    id: Uuid,
    parts: Vec<String>,
    effect: EffectJson,
}

impl Serialize for Group {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        GroupSer {
            id: self.id,
            parts: &self.parts,
            effect: effects::to_json(self.effect.as_ref()),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Group {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let group = GroupDe::deserialize(deserializer)?;
        let effect = effects::from_json(group.effect).map_err(de::Error::custom)?;

        Ok(Self {
            id: group.id,
            parts: group.parts,
            effect,
        })
    }
}
