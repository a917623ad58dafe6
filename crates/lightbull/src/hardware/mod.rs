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

use parking_lot::{Mutex, MutexGuard};

use crate::{config::Config, persistence::Persistence};

pub mod leds;
pub mod output;
pub mod system;

pub use leds::{LedError, LedStrip, Rgb};
pub use system::{EthernetConfig, EthernetMode, System, SystemError};

/// All connected hardware: the LED chain and the controller board itself.
#[derive(Debug)]
pub struct Hardware {
    led: Mutex<LedStrip>,
    system: System,
}

impl Hardware {
    /// Build the LED part table from the configuration and connect to the
    /// hardware.
    pub fn new(config: &Config, persistence: &Persistence) -> Result<Self, LedError> {
        let mut led = LedStrip::new();

        for part in &config.leds.parts {
            for &[first, last] in &part.leds {
                led.add_part(&part.name, first, last);
            }
        }

        led.init(&config.leds)?;

        Ok(Self {
            led: Mutex::new(led),
            system: System::new(&config.ethernet, persistence),
        })
    }

    /// Exclusive access to the LED chain. The render loop holds this for the
    /// duration of one frame.
    pub fn leds(&self) -> MutexGuard<'_, LedStrip> {
        self.led.lock()
    }

    pub fn system(&self) -> &System {
        &self.system
    }
}
