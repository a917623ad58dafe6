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
    utils::map_percent_i64,
    Effect, EffectKind,
};
use crate::{
    hardware::LedStrip,
    shows::parameters::{Parameter, ParameterType},
};

/// Alternates all of its parts between two colors.
///
/// The speed parameter maps inversely onto the length of one on-off cycle,
/// from five seconds down to 100 milliseconds. The ratio parameter decides
/// how much of the cycle is spent on the primary color.
#[derive(Debug)]
pub struct BlinkEffect {
    color_primary: Parameter,
    color_secondary: Parameter,
    speed: Parameter,
    ratio: Parameter,

    ns_since_cycle_start: i64,
}

impl BlinkEffect {
    pub fn new() -> Self {
        Self {
            color_primary: Parameter::new("colorPrimary", ParameterType::Color, "Primary color"),
            color_secondary: Parameter::new(
                "colorSecondary",
                ParameterType::Color,
                "Secondary color",
            ),
            speed: Parameter::new("speed", ParameterType::Percent, "Speed"),
            ratio: Parameter::new("ratio", ParameterType::Percent, "Ratio"),
            ns_since_cycle_start: 0,
        }
    }
}

impl Default for BlinkEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for BlinkEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Blink
    }

    fn name(&self) -> &'static str {
        "Blink"
    }

    fn update(&mut self, leds: &mut LedStrip, parts: &[&str], delta: Duration) {
        let speed = self.speed.integer();
        let ratio = self.ratio.integer();

        // Higher speed means a shorter cycle.
        let interval = map_percent_i64(5_000_000_000, 100_000_000, speed).max(1);
        let interval_on = map_percent_i64(0, interval, ratio);

        self.ns_since_cycle_start =
            (self.ns_since_cycle_start + delta.as_nanos() as i64) % interval;

        let color = if self.ns_since_cycle_start < interval_on {
            self.color_primary.color()
        } else {
            self.color_secondary.color()
        };

        for part in parts {
            leds.set_color_all_part(part, color.r, color.g, color.b);
        }
    }

    fn parameters(&self) -> Vec<&Parameter> {
        vec![
            &self.color_primary,
            &self.color_secondary,
            &self.speed,
            &self.ratio,
        ]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![
            &mut self.color_primary,
            &mut self.color_secondary,
            &mut self.speed,
            &mut self.ratio,
        ]
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

    fn effect(speed: i64, ratio: i64) -> BlinkEffect {
        let mut effect = BlinkEffect::new();

        effect
            .color_primary
            .set_current(Value::Color(Color { r: 255, g: 0, b: 0 }))
            .expect("We should be able to set the primary color");
        effect
            .color_secondary
            .set_current(Value::Color(Color { r: 0, g: 0, b: 255 }))
            .expect("We should be able to set the secondary color");
        effect
            .speed
            .set_current(Value::Integer(speed))
            .expect("We should be able to set the speed");
        effect
            .ratio
            .set_current(Value::Integer(ratio))
            .expect("We should be able to set the ratio");

        effect
    }

    #[test]
    fn primary_then_secondary() {
        // Full speed and a 50% ratio: a 100ms cycle that switches to the
        // secondary color at the 50ms mark.
        let mut strip = test_strip(100);
        let mut effect = effect(100, 50);

        effect.update(&mut strip, &["head_left"], Duration::from_millis(40));
        assert_eq!(
            strip.get_color("head_left", 0),
            Rgb { r: 255, g: 0, b: 0 },
            "At 40ms the primary half of the cycle should be active"
        );

        effect.update(&mut strip, &["head_left"], Duration::from_millis(20));
        assert_eq!(
            strip.get_color("head_left", 0),
            Rgb { r: 0, g: 0, b: 255 },
            "At 60ms the secondary half of the cycle should be active"
        );

        effect.update(&mut strip, &["head_left"], Duration::from_millis(45));
        assert_eq!(
            strip.get_color("head_left", 0),
            Rgb { r: 255, g: 0, b: 0 },
            "At 105ms the cycle should have wrapped back to the primary color"
        );
    }

    #[test]
    fn zero_ratio_never_shows_the_primary_color() {
        let mut strip = test_strip(100);
        let mut effect = effect(100, 0);

        for _ in 0..10 {
            effect.update(&mut strip, &["head_left"], Duration::from_millis(15));
            assert_eq!(
                strip.get_color("head_left", 3),
                Rgb { r: 0, g: 0, b: 255 },
                "With a zero ratio the on-interval is empty"
            );
        }
    }
}
