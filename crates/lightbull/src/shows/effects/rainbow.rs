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

use super::{
    utils::{advance_position, direction_factor, hsv_to_rgb, map_percent_f64, modulo},
    Effect, EffectKind,
};
use crate::{
    hardware::LedStrip,
    shows::parameters::{Parameter, ParameterType},
};

/// Spreads the full hue circle over the group's parts and rotates it.
#[derive(Debug)]
pub struct RainbowEffect {
    speed: Parameter,
    reversed: Parameter,

    current_position: f64,
}

impl RainbowEffect {
    pub fn new() -> Self {
        Self {
            speed: Parameter::new("speed", ParameterType::Percent, "Speed"),
            reversed: Parameter::new("reversed", ParameterType::Boolean, "Reversed"),
            current_position: 0.0,
        }
    }
}

impl Default for RainbowEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for RainbowEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Rainbow
    }

    fn name(&self) -> &'static str {
        "Rainbow"
    }

    fn update(&mut self, leds: &mut LedStrip, parts: &[&str], delta: Duration) {
        let reversed = self.reversed.boolean();

        let num_leds = leds.num_leds_multi_part(parts) as i64;
        if num_leds == 0 {
            return;
        }

        let leds_per_second = map_percent_f64(0.0, 300.0, self.speed.integer());
        let pos = advance_position(
            &mut self.current_position,
            leds_per_second,
            num_leds,
            delta,
            reversed,
        );
        let dir = direction_factor(reversed);

        for i in 0..num_leds {
            let hue = if num_leds > 1 {
                modulo(i * dir * 360 / (num_leds - 1), 360)
            } else {
                0
            };
            let (r, g, b) = hsv_to_rgb(hue, 100, 100);

            leds.set_color_multi_part(parts, pos + dir * i, r, g, b, true);
        }
    }

    fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.speed, &self.reversed]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.speed, &mut self.reversed]
    }
}
