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

/// Lights a single LED in every part, to find out which physical LED sits at
/// which position.
#[derive(Debug)]
pub struct CalibrationEffect {
    color: Parameter,
    led_id: Parameter,
}

impl CalibrationEffect {
    pub fn new() -> Self {
        Self {
            color: Parameter::new("color", ParameterType::Color, "Color"),
            led_id: Parameter::new(
                "ledId",
                ParameterType::IntegerGreaterOrEqualZero,
                "ID of the Led to set",
            ),
        }
    }
}

impl Default for CalibrationEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for CalibrationEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Calibration
    }

    fn name(&self) -> &'static str {
        "Calibration"
    }

    fn update(&mut self, leds: &mut LedStrip, parts: &[&str], _delta: Duration) {
        let color = self.color.color();
        let led_id = self.led_id.integer();

        for part in parts {
            leds.set_color_all_part(part, 0, 0, 0);

            // A position beyond the end of a part is silently skipped, the
            // operator may be probing a longer sibling part.
            if (0..leds.num_leds(part) as i64).contains(&led_id) {
                leds.set_color(part, led_id as usize, color.r, color.g, color.b);
            }
        }
    }

    fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.color, &self.led_id]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.color, &mut self.led_id]
    }
}
