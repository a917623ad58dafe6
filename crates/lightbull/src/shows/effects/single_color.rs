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

use super::{Effect, EffectKind};
use crate::{
    hardware::LedStrip,
    shows::parameters::{Parameter, ParameterType},
};

/// Fills all of its parts with one static color.
#[derive(Debug)]
pub struct SingleColorEffect {
    color: Parameter,
}

impl SingleColorEffect {
    pub fn new() -> Self {
        Self {
            color: Parameter::new("color", ParameterType::Color, "Color"),
        }
    }
}

impl Default for SingleColorEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for SingleColorEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::SingleColor
    }

    fn name(&self) -> &'static str {
        "Single Color"
    }

    fn update(&mut self, leds: &mut LedStrip, parts: &[&str], _delta: Duration) {
        let color = self.color.color();

        for part in parts {
            leds.set_color_all_part(part, color.r, color.g, color.b);
        }
    }

    fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.color]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.color]
    }
}

#[cfg(test)]
mod test {
    use similar_asserts::assert_eq;

    use super::*;
    use crate::{
        hardware::{leds::test::test_strip, Rgb},
        shows::parameters::{Color, Value},
    };

    #[test]
    fn fills_all_given_parts() {
        let mut strip = test_strip(100);
        let mut effect = SingleColorEffect::new();

        effect
            .color
            .set_current(Value::Color(Color { r: 255, g: 0, b: 0 }))
            .expect("We should be able to set the color");

        effect.update(
            &mut strip,
            &["head_left", "head_right"],
            Duration::from_millis(40),
        );

        for i in 0..10 {
            assert_eq!(strip.get_color("head_left", i), Rgb { r: 255, g: 0, b: 0 });
            assert_eq!(strip.get_color("head_right", i), Rgb { r: 255, g: 0, b: 0 });
            assert_eq!(
                strip.get_color("tail", i),
                Rgb::default(),
                "A part outside of the group should stay dark"
            );
        }
    }
}
