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

/// Map a percentage onto the range `min..=max`.
pub(super) fn map_percent_i64(min: i64, max: i64, percent: i64) -> i64 {
    min + (max - min) * percent / 100
}

/// Map a percentage onto the range `min..=max`, with float precision.
pub(super) fn map_percent_f64(min: f64, max: f64, percent: i64) -> f64 {
    min + (max - min) * percent as f64 / 100.0
}

/// `%` with the result normalized into `0..y`, also for negative `x`.
pub(super) fn modulo(x: i64, y: i64) -> i64 {
    x.rem_euclid(y)
}

/// A factor that reverses position offsets for effects that can run
/// backwards.
pub(super) fn direction_factor(reversed: bool) -> i64 {
    if reversed {
        -1
    } else {
        1
    }
}

/// Advance a float position by a constant speed and return the LED it landed
/// on.
///
/// The position is kept as a float between frames so that slow movements do
/// not lose the sub-LED remainder, and normalized into `0..num_leds`.
pub(super) fn advance_position(
    position: &mut f64,
    leds_per_second: f64,
    num_leds: i64,
    delta: Duration,
    reversed: bool,
) -> i64 {
    *position += direction_factor(reversed) as f64 * leds_per_second * delta.as_secs_f64();
    *position = position.rem_euclid(num_leds as f64);

    *position as i64
}

/// Convert a HSV color to RGB bytes.
///
/// `h` is in degrees, `s` and `v` in percent. Standard sextant formulation.
pub(super) fn hsv_to_rgb(h: i64, s: i64, v: i64) -> (u8, u8, u8) {
    let h = h as f64 / 60.0;
    let s = s as f64 / 100.0;
    let v = v as f64 / 100.0;

    let sextant = h.floor() as i64 % 6;
    let f = h - h.floor();

    let p = (255.0 * v * (1.0 - s)).round();
    let q = (255.0 * v * (1.0 - s * f)).round();
    let t = (255.0 * v * (1.0 - s * (1.0 - f))).round();
    let v = (255.0 * v).round();

    let (r, g, b) = match sextant {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    (r as u8, g as u8, b as u8)
}
