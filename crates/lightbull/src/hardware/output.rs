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
    fmt::Debug,
    io::{self, Write},
};

use itertools::Itertools;
use spidev::{SpiModeFlags, Spidev, SpidevOptions};

use super::leds::Rgb;

/// Sink for fully rendered LED frames.
///
/// The render loop composes into an in-memory frame buffer and hands the
/// finished frame to an output once per tick.
pub trait LedOutput: Debug + Send {
    /// Write one complete frame, one [`Rgb`] value per LED on the chain.
    fn write_frame(&mut self, pixels: &[Rgb]) -> io::Result<()>;
}

/// APA102 chain on the first SPI bus.
///
/// The wire format is a zero start frame, one 4-byte slot per LED with the
/// global brightness field pinned to full (brightness is handled in software
/// by the color cap), and enough trailing clock pulses to push the data
/// through the whole chain.
#[derive(Debug)]
pub struct Apa102Output {
    spi: Spidev,
}

const SPI_DEVICE: &str = "/dev/spidev0.0";

impl Apa102Output {
    pub fn open(spi_mhz: u32) -> io::Result<Self> {
        let mut spi = Spidev::open(SPI_DEVICE)?;

        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(spi_mhz.saturating_mul(1_000_000))
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        spi.configure(&options)?;

        Ok(Self { spi })
    }
}

impl LedOutput for Apa102Output {
    fn write_frame(&mut self, pixels: &[Rgb]) -> io::Result<()> {
        // One end-frame byte provides 8 clock pulses and every LED on the
        // chain eats half a pulse, so n/16 extra bytes push the last LED out.
        let end_frame_len = pixels.len() / 16 + 1;
        let mut frame = Vec::with_capacity(4 + pixels.len() * 4 + end_frame_len);

        frame.extend_from_slice(&[0x00; 4]);

        for pixel in pixels {
            frame.extend_from_slice(&[0xE0 | 0x1F, pixel.b, pixel.g, pixel.r]);
        }

        frame.resize(frame.len() + end_frame_len, 0x00);

        self.spi.write_all(&frame)
    }
}

/// Console drawer used when no SPI device is available.
///
/// Renders the frame as a single line of truecolor blocks, redrawn in place.
#[derive(Debug, Default)]
pub struct ConsoleOutput;

impl LedOutput for ConsoleOutput {
    fn write_frame(&mut self, pixels: &[Rgb]) -> io::Result<()> {
        let line = pixels
            .iter()
            .map(|pixel| format!("\x1b[38;2;{};{};{}m█", pixel.r, pixel.g, pixel.b))
            .join("");

        let mut stdout = io::stdout().lock();
        write!(stdout, "\r{line}\x1b[0m")?;
        stdout.flush()
    }
}
