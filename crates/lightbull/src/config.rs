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

use std::path::{Path, PathBuf};

use config::{File, FileFormat};
use serde::Deserialize;

/// The fully resolved boot configuration.
///
/// The configuration is read once at startup and then threaded into the
/// constructors that need it. Defaults match a bare controller: API on port
/// 8080, no password set, unmanaged network, 80% brightness cap, 25 FPS.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    /// Name of the ethernet interface managed by the controller. An empty
    /// string leaves the network configuration alone.
    pub ethernet: String,
    pub directories: DirectoriesConfig,
    pub leds: LedsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// TCP port the REST API and websocket endpoint listen on.
    pub listen: u16,
    /// bcrypt hash of the shared operator password. An empty string disables
    /// authentication entirely, which is only sensible on the bench.
    pub authentication: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoriesConfig {
    /// Directory holding the persistent state: shows, the JWT key and the
    /// ethernet configuration.
    pub config: PathBuf,
    pub tmp: PathBuf,
}

// The lowercase aliases cover configuration backends that fold keys to
// lowercase while the file format itself stays camelCase.
#[derive(Debug, Clone, Deserialize)]
pub struct LedsConfig {
    /// Upper bound for `r + g + b` per LED, as a percentage of the maximum
    /// `3 * 255`. Keeps the power supply alive.
    #[serde(rename = "brightnessCap", alias = "brightnesscap")]
    pub brightness_cap: u8,
    #[serde(rename = "spiMHz", alias = "spimhz")]
    pub spi_mhz: u32,
    pub fps: f64,
    /// Draw frames on the console even when no SPI device was found.
    #[serde(rename = "drawDummy", alias = "drawdummy", default)]
    pub draw_dummy: bool,
    #[serde(default)]
    pub parts: Vec<PartConfig>,
}

/// One named part of the LED chain, given as inclusive `[first, last]` index
/// ranges. A range may run backwards and a part may own several ranges.
#[derive(Debug, Clone, Deserialize)]
pub struct PartConfig {
    pub name: String,
    pub leds: Vec<[usize; 2]>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read the configuration: {0}")]
    Read(#[from] config::ConfigError),
    #[error("invalid port to listen on")]
    InvalidListenPort,
    #[error("leds.fps must be greater than zero")]
    InvalidFps,
}

impl Config {
    /// Load the configuration from the given file, or from `./config.yaml`
    /// and `/etc/lightbull/config.yaml` when no explicit path was passed.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("api.listen", 8080)?
            .set_default("api.authentication", "")?
            .set_default("ethernet", "")?
            .set_default("directories.config", "/lightbull")?
            .set_default("directories.tmp", "/var/cache/lightbull")?
            .set_default("leds.brightnessCap", 80)?
            .set_default("leds.spiMHz", 1)?
            .set_default("leds.fps", 25)?
            .set_default("leds.drawDummy", false)?
            .set_default("leds.parts", Vec::<config::Value>::new())?;

        builder = if let Some(path) = path {
            builder.add_source(File::from(path).format(FileFormat::Yaml))
        } else {
            builder
                .add_source(File::new("config", FileFormat::Yaml).required(false))
                .add_source(
                    File::new("/etc/lightbull/config", FileFormat::Yaml).required(false),
                )
        };

        let config: Config = builder.build()?.try_deserialize()?;

        if config.api.listen == 0 {
            return Err(ConfigError::InvalidListenPort);
        }

        if !(config.leds.fps > 0.0) {
            return Err(ConfigError::InvalidFps);
        }

        Ok(config)
    }
}
