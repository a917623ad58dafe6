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
    utils::{advance_position, direction_factor, map_percent_f64},
    Effect, EffectKind,
};
use crate::{
    hardware::LedStrip,
    shows::parameters::{Parameter, ParameterType},
};

/// Draws stripes of the primary color over a secondary background, slowly
/// moving along the virtual strip formed by the group's parts.
#[derive(Debug)]
pub struct StripesEffect {
    color_primary: Parameter,
    color_secondary: Parameter,
    speed: Parameter,
    length: Parameter,
    gap: Parameter,
    reversed: Parameter,

    current_position: f64,
}

impl StripesEffect {
    pub fn new() -> Self {
        Self {
            color_primary: Parameter::new("colorPrimary", ParameterType::Color, "Primary color"),
            color_secondary: Parameter::new(
                "colorSecondary",
                ParameterType::Color,
                "Secondary color",
            ),
            speed: Parameter::new("speed", ParameterType::Percent, "Speed"),
            length: Parameter::new("length", ParameterType::IntegerGreaterZero, "Length"),
            gap: Parameter::new("gap", ParameterType::IntegerGreaterZero, "Gap"),
            reversed: Parameter::new("reversed", ParameterType::Boolean, "Reversed"),
            current_position: 0.0,
        }
    }
}

impl Default for StripesEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for StripesEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Stripes
    }

    fn name(&self) -> &'static str {
        "Stripes"
    }

    fn update(&mut self, leds: &mut LedStrip, parts: &[&str], delta: Duration) {
        let primary = self.color_primary.color();
        let secondary = self.color_secondary.color();
        let length = self.length.integer();
        let gap = self.gap.integer();
        let reversed = self.reversed.boolean();

        let num_leds = leds.num_leds_multi_part(parts) as i64;
        let period = length + gap;
        if num_leds == 0 || period <= 0 {
            return;
        }

        let leds_per_second = map_percent_f64(0.0, 75.0, self.speed.integer());
        let pos = advance_position(
            &mut self.current_position,
            leds_per_second,
            num_leds,
            delta,
            reversed,
        );
        let dir = direction_factor(reversed);

        // Draw one full pattern starting at the current position, wrapping
        // around the end of the virtual strip.
        for i in 0..num_leds {
            let color = if i % period < length { primary } else { secondary };
            leds.set_color_multi_part(parts, pos + dir * i, color.r, color.g, color.b, true);
        }
    }

    fn parameters(&self) -> Vec<&Parameter> {
        vec![
            &self.color_primary,
            &self.color_secondary,
            &self.speed,
            &self.length,
            &self.gap,
            &self.reversed,
        ]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![
            &mut self.color_primary,
            &mut self.color_secondary,
            &mut self.speed,
            &mut self.length,
            &mut self.gap,
            &mut self.reversed,
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

    const RED: Rgb = Rgb { r: 255, g: 0, b: 0 };
    const BLUE: Rgb = Rgb { r: 0, g: 0, b: 255 };

    fn effect(length: i64, gap: i64) -> StripesEffect {
        let mut effect = StripesEffect::new();

        effect
            .color_primary
            .set_current(Value::Color(Color { r: 255, g: 0, b: 0 }))
            .expect("We should be able to set the primary color");
        effect
            .color_secondary
            .set_current(Value::Color(Color { r: 0, g: 0, b: 255 }))
            .expect("We should be able to set the secondary color");
        effect
            .length
            .set_current(Value::Integer(length))
            .expect("We should be able to set the stripe length");
        effect
            .gap
            .set_current(Value::Integer(gap))
            .expect("We should be able to set the gap");
        effect
            .speed
            .set_current(Value::Integer(0))
            .expect("We should be able to set the speed");

        effect
    }

    #[test]
    fn pattern_alternates_with_length_and_gap() {
        let mut strip = test_strip(100);
        let mut effect = effect(2, 3);

        effect.update(&mut strip, &["head_left"], Duration::from_millis(40));

        // With length 2 and gap 3 at a standstill the pattern repeats every
        // five LEDs: two primary, three secondary.
        for i in 0..10 {
            let expected = if i % 5 < 2 { RED } else { BLUE };
            assert_eq!(
                strip.get_color("head_left", i),
                expected,
                "LED {i} should follow the stripe pattern"
            );
        }
    }

    #[test]
    fn pattern_spans_multiple_parts() {
        let mut strip = test_strip(100);
        let mut effect = effect(10, 10);

        effect.update(
            &mut strip,
            &["head_left", "head_right"],
            Duration::from_millis(40),
        );

        for i in 0..10 {
            assert_eq!(
                strip.get_color("head_left", i),
                RED,
                "The first part should be one full stripe"
            );
            assert_eq!(
                strip.get_color("head_right", i),
                BLUE,
                "The second part should be one full gap"
            );
        }
    }

    #[test]
    fn position_moves_with_speed() {
        let mut strip = test_strip(100);
        let mut effect = effect(5, 5);
        effect
            .speed
            .set_current(Value::Integer(4))
            .expect("We should be able to set the speed");

        // 4% of 75 LEDs/s is three LEDs per second, so after one second the
        // pattern has shifted by three LEDs.
        effect.update(&mut strip, &["head_left"], Duration::from_secs(1));

        for i in 0..10 {
            let expected = if (i + 10 - 3) % 10 < 5 { RED } else { BLUE };
            assert_eq!(
                strip.get_color("head_left", i),
                expected,
                "LED {i} should follow the shifted pattern"
            );
        }
    }
}
