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

use std::{collections::HashMap, io};

use tracing::warn;

use super::output::{Apa102Output, ConsoleOutput, LedOutput};
use crate::config::LedsConfig;

/// One stored LED color. The alpha channel of the wire format is pinned to
/// full, so only the three color channels are kept.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, thiserror::Error)]
pub enum LedError {
    #[error("no LEDs defined")]
    NoLeds,
    #[error("failed to set up the LED output: {0}")]
    Output(#[from] io::Error),
}

/// The LED chain: part-name to absolute-index mapping, the frame buffer and
/// the brightness cap.
///
/// Build one with [`LedStrip::new`], describe the topology with
/// [`LedStrip::add_part`] and then call [`LedStrip::init`] to allocate the
/// frame buffer and connect the output.
#[derive(Debug)]
pub struct LedStrip {
    /// Part names in the order they were first added.
    parts: Vec<String>,
    part_leds: HashMap<String, Vec<usize>>,
    max_led_id: Option<usize>,

    pixels: Vec<Rgb>,
    /// Maximum allowed `r + g + b` sum per LED, in `0..=765`.
    max_color_sum: u32,

    output: Option<Box<dyn LedOutput>>,
    /// True when the output is the console fallback instead of real hardware.
    dummy: bool,
    draw_dummy: bool,
}

impl LedStrip {
    pub fn new() -> Self {
        Self {
            parts: Vec::new(),
            part_leds: HashMap::new(),
            max_led_id: None,
            pixels: Vec::new(),
            max_color_sum: 765,
            output: None,
            dummy: false,
            draw_dummy: false,
        }
    }

    /// Append the inclusive index range `first..=last` to the part `name`,
    /// creating the part on first use. A range with `first > last` runs
    /// backwards. Can be called multiple times per part, the ranges
    /// concatenate in the order given.
    pub fn add_part(&mut self, name: &str, first: usize, last: usize) {
        if !self.has_part(name) {
            self.parts.push(name.to_owned());
        }

        let ids = self.part_leds.entry(name.to_owned()).or_default();
        if first <= last {
            ids.extend(first..=last);
        } else {
            ids.extend((last..=first).rev());
        }

        let highest = first.max(last);
        if self.max_led_id.map_or(true, |max| highest > max) {
            self.max_led_id = Some(highest);
        }
    }

    /// Allocate the frame buffer and connect the SPI output.
    ///
    /// When no SPI device can be opened the strip falls back to drawing on
    /// the console; `leds.drawDummy` decides whether the fallback actually
    /// prints anything.
    pub fn init(&mut self, config: &LedsConfig) -> Result<(), LedError> {
        let output: Box<dyn LedOutput> = match Apa102Output::open(config.spi_mhz) {
            Ok(output) => {
                self.dummy = false;
                Box::new(output)
            }
            Err(error) => {
                warn!("Failed to open a SPI port, drawing on the console: {error}");
                self.dummy = true;
                Box::new(ConsoleOutput)
            }
        };

        self.init_with_output(config, output)
    }

    /// Like [`LedStrip::init`], but with a caller-provided output. Used by
    /// tests and by anything that wants to render off-device.
    pub fn init_with_output(
        &mut self,
        config: &LedsConfig,
        output: Box<dyn LedOutput>,
    ) -> Result<(), LedError> {
        let Some(max_led_id) = self.max_led_id else {
            return Err(LedError::NoLeds);
        };

        self.pixels = vec![Rgb::default(); max_led_id + 1];
        self.max_color_sum = 765 * u32::from(config.brightness_cap.min(100)) / 100;
        self.draw_dummy = config.draw_dummy;
        self.output = Some(output);

        Ok(())
    }

    /// The names of all parts, in definition order.
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn has_part(&self, part: &str) -> bool {
        self.part_leds.contains_key(part)
    }

    /// The number of LEDs in a part.
    ///
    /// # Panics
    ///
    /// Panics if the part does not exist, using an unknown part name is a
    /// bug in the caller.
    pub fn num_leds(&self, part: &str) -> usize {
        self.part_ids(part).len()
    }

    /// The total number of LEDs over a list of parts treated as one virtual
    /// strip.
    pub fn num_leds_multi_part(&self, parts: &[&str]) -> usize {
        parts.iter().map(|part| self.num_leds(part)).sum()
    }

    /// The total number of LEDs in the frame buffer, `max_index + 1`.
    pub fn num_leds_total(&self) -> usize {
        self.max_led_id.map_or(0, |max| max + 1)
    }

    /// Set the color of a single LED inside a part. The brightness cap is
    /// applied before the value is stored. Changes become visible with the
    /// next [`LedStrip::update`] call.
    ///
    /// # Panics
    ///
    /// Panics on an unknown part or an out-of-range position, both are
    /// contract violations.
    pub fn set_color(&mut self, part: &str, pos: usize, r: u8, g: u8, b: u8) {
        let id = self.part_ids(part)[pos];
        self.pixels[id] = self.capped(r, g, b);
    }

    /// Set the color of one LED on the virtual strip formed by concatenating
    /// `parts`. With `wrap` the position is taken modulo the total length,
    /// negative positions wrap from the end. Without `wrap` an out-of-range
    /// position does nothing.
    pub fn set_color_multi_part(
        &mut self,
        parts: &[&str],
        pos: i64,
        r: u8,
        g: u8,
        b: u8,
        wrap: bool,
    ) {
        let total = self.num_leds_multi_part(parts) as i64;
        if total == 0 {
            return;
        }

        let pos = if wrap {
            pos.rem_euclid(total)
        } else if (0..total).contains(&pos) {
            pos
        } else {
            return;
        };

        let mut remaining = pos as usize;
        for part in parts {
            let len = self.num_leds(part);
            if remaining < len {
                self.set_color(part, remaining, r, g, b);
                return;
            }
            remaining -= len;
        }
    }

    /// Set every LED of a part to the same color.
    pub fn set_color_all_part(&mut self, part: &str, r: u8, g: u8, b: u8) {
        for pos in 0..self.num_leds(part) {
            self.set_color(part, pos, r, g, b);
        }
    }

    /// Set every defined LED to the same color.
    pub fn set_color_all(&mut self, r: u8, g: u8, b: u8) {
        for part in self.parts.clone() {
            self.set_color_all_part(&part, r, g, b);
        }
    }

    /// The stored color of a single LED, after the brightness cap.
    pub fn get_color(&self, part: &str, pos: usize) -> Rgb {
        let id = self.part_ids(part)[pos];
        self.pixels[id]
    }

    /// Flush the frame buffer to the output. Skipped entirely when running
    /// against the console fallback with `drawDummy` disabled.
    pub fn update(&mut self) -> io::Result<()> {
        if self.dummy && !self.draw_dummy {
            return Ok(());
        }

        match &mut self.output {
            Some(output) => output.write_frame(&self.pixels),
            None => Ok(()),
        }
    }

    fn part_ids(&self, part: &str) -> &[usize] {
        self.part_leds
            .get(part)
            .unwrap_or_else(|| panic!("invalid part name: {part}"))
    }

    /// Scale the color down so that `r + g + b` stays below the cap. The
    /// channels are reduced proportionally, which keeps the hue.
    fn capped(&self, r: u8, g: u8, b: u8) -> Rgb {
        let sum = u32::from(r) + u32::from(g) + u32::from(b);

        if sum <= self.max_color_sum {
            Rgb { r, g, b }
        } else {
            let diff = sum - self.max_color_sum;
            Rgb {
                r: r - (diff * u32::from(r) / sum) as u8,
                g: g - (diff * u32::from(g) / sum) as u8,
                b: b - (diff * u32::from(b) / sum) as u8,
            }
        }
    }
}

impl Default for LedStrip {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use similar_asserts::assert_eq;

    use super::*;

    pub(crate) fn config(brightness_cap: u8) -> LedsConfig {
        LedsConfig {
            brightness_cap,
            spi_mhz: 1,
            fps: 25.0,
            draw_dummy: false,
            parts: Vec::new(),
        }
    }

    pub(crate) fn test_strip(brightness_cap: u8) -> LedStrip {
        let mut strip = LedStrip::new();
        strip.add_part("head_left", 0, 9);
        strip.add_part("head_right", 10, 19);
        strip.add_part("tail", 29, 20);

        strip
            .init_with_output(&config(brightness_cap), Box::new(NullOutput))
            .expect("We should be able to initialize a strip with parts");

        strip
    }

    #[derive(Debug)]
    pub(crate) struct NullOutput;

    impl LedOutput for NullOutput {
        fn write_frame(&mut self, _: &[Rgb]) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn part_mapping_round_trip() {
        let mut strip = test_strip(100);

        strip.set_color("head_left", 3, 10, 20, 30);
        assert_eq!(
            strip.get_color("head_left", 3),
            Rgb { r: 10, g: 20, b: 30 },
            "A color below the cap should be stored unchanged"
        );
    }

    #[test]
    fn reversed_range_maps_backwards() {
        let mut strip = test_strip(100);

        // "tail" was defined as 29..=20, so local position 0 is LED 29 and
        // the part must not overlap with position 9 which is LED 20.
        strip.set_color("tail", 0, 1, 2, 3);
        assert_eq!(strip.get_color("tail", 0), Rgb { r: 1, g: 2, b: 3 });
        assert_eq!(strip.get_color("tail", 9), Rgb::default());
    }

    #[test]
    fn multiple_ranges_concatenate() {
        let mut strip = LedStrip::new();
        strip.add_part("ring", 0, 4);
        strip.add_part("ring", 10, 14);
        strip
            .init_with_output(&config(100), Box::new(NullOutput))
            .expect("We should be able to initialize the strip");

        assert_eq!(strip.num_leds("ring"), 10);
        assert_eq!(strip.num_leds_total(), 15);

        strip.set_color("ring", 7, 9, 9, 9);
        assert_eq!(
            strip.get_color("ring", 7),
            Rgb { r: 9, g: 9, b: 9 },
            "Position 7 should land in the second range"
        );
    }

    #[test]
    fn brightness_cap_scales_proportionally() {
        // 80% cap -> 765 * 80 / 100 = 612.
        let mut strip = test_strip(80);

        strip.set_color("head_left", 0, 255, 255, 255);
        let color = strip.get_color("head_left", 0);
        let sum = u32::from(color.r) + u32::from(color.g) + u32::from(color.b);
        assert!(
            sum <= 612,
            "The capped sum should stay below the cap, got {sum}"
        );
        assert_eq!(
            color.r, color.g,
            "An equal input ratio should stay equal after capping"
        );
        assert_eq!(color.g, color.b);
    }

    #[test]
    fn brightness_cap_leaves_dim_colors_alone() {
        let mut strip = test_strip(80);

        strip.set_color("head_left", 0, 100, 100, 100);
        assert_eq!(
            strip.get_color("head_left", 0),
            Rgb { r: 100, g: 100, b: 100 },
            "A color below the cap should pass through untouched"
        );
    }

    #[test]
    fn wrap_is_positive_modulo() {
        let parts = ["head_left", "head_right"];

        for pos in [-23_i64, -20, -1, 0, 5, 19, 20, 43] {
            let mut wrapped = test_strip(100);
            let mut plain = test_strip(100);

            wrapped.set_color_multi_part(&parts, pos, 50, 60, 70, true);
            plain.set_color_multi_part(&parts, pos.rem_euclid(20), 50, 60, 70, false);

            for part in parts {
                for i in 0..wrapped.num_leds(part) {
                    assert_eq!(
                        wrapped.get_color(part, i),
                        plain.get_color(part, i),
                        "Wrapping position {pos} should equal the positive modulo"
                    );
                }
            }
        }
    }

    #[test]
    fn out_of_range_without_wrap_is_a_no_op() {
        let mut strip = test_strip(100);

        strip.set_color_multi_part(&["head_left"], 10, 1, 1, 1, false);
        strip.set_color_multi_part(&["head_left"], -1, 1, 1, 1, false);

        for i in 0..10 {
            assert_eq!(
                strip.get_color("head_left", i),
                Rgb::default(),
                "An out-of-range write without wrap should not change LED {i}"
            );
        }
    }

    #[test]
    fn set_color_all() {
        let mut strip = test_strip(100);

        strip.set_color_all(5, 6, 7);

        for part in ["head_left", "head_right", "tail"] {
            for i in 0..10 {
                assert_eq!(strip.get_color(part, i), Rgb { r: 5, g: 6, b: 7 });
            }
        }
    }
}
