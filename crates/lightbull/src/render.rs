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

use std::{sync::Arc, time::Instant};

use tokio::task::JoinHandle;
use tracing::warn;

use crate::{hardware::Hardware, shows::ShowCollection};

/// Spawn the render loop: a fixed-cadence pump that draws the current visual
/// into the LED buffer and flushes it to the hardware.
///
/// Each tick sleeps for one frame period, measures the wall-clock time that
/// actually passed and hands it to the current visual's effects. The
/// collection lock is taken once per frame for the duration of the draw, so
/// a concurrent mutation can delay a frame slightly but a frame never mixes
/// old and new state of the graph.
///
/// The loop has no shutdown path, it lives until the process exits.
pub fn spawn(shows: Arc<ShowCollection>, hardware: Arc<Hardware>, fps: f64) -> JoinHandle<()> {
    let frame_period = std::time::Duration::from_secs_f64(1.0 / fps);

    tokio::spawn(async move {
        let mut last_tick = Instant::now();

        loop {
            tokio::time::sleep(frame_period).await;

            let delta = last_tick.elapsed();
            last_tick = Instant::now();

            let mut leds = hardware.leds();
            shows.write().render_frame(&mut leds, delta);

            if let Err(error) = leds.update() {
                warn!("Failed to write the frame to the LEDs: {error}");
            }
        }
    })
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use similar_asserts::assert_eq;

    use super::*;
    use crate::{
        config::{Config, ApiConfig, DirectoriesConfig, LedsConfig, PartConfig},
        hardware::Rgb,
        persistence::Persistence,
        shows::effects::EffectKind,
    };

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            api: ApiConfig {
                listen: 8080,
                authentication: String::new(),
            },
            ethernet: String::new(),
            directories: DirectoriesConfig {
                config: dir.to_owned(),
                tmp: dir.to_owned(),
            },
            leds: LedsConfig {
                brightness_cap: 100,
                spi_mhz: 1,
                fps: 25.0,
                draw_dummy: false,
                parts: vec![PartConfig {
                    name: "head_left".to_owned(),
                    leds: vec![[0, 9]],
                }],
            },
        }
    }

    #[tokio::test]
    async fn renders_the_current_visual() {
        let dir = tempfile::tempdir().expect("We should be able to create a temporary directory");
        let config = test_config(dir.path());
        let persistence = Persistence::new(&config.directories.config)
            .expect("We should be able to create the persistence store");

        let hardware = Arc::new(
            Hardware::new(&config, &persistence)
                .expect("We should be able to set up the hardware"),
        );
        let shows = Arc::new(ShowCollection::new());

        {
            let mut state = shows.write();
            let show_id = state.new_show("Festival", false).unwrap().id();
            let show = state.show_by_id_mut(show_id).unwrap();
            let visual_id = show.new_visual("Warmup").id();
            let visual = show.find_visual_mut(visual_id).unwrap();
            let parameter_id = visual
                .new_group(vec!["head_left".to_owned()], EffectKind::SingleColor)
                .effect()
                .parameters()[0]
                .id();
            visual
                .set_parameter_current(parameter_id, &serde_json::json!({"r": 255, "g": 0, "b": 0}))
                .unwrap();
            state.set_current(Some(show_id), Some(visual_id)).unwrap();
        }

        spawn(shows.clone(), hardware.clone(), 100.0);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(
            hardware.leds().get_color("head_left", 0),
            Rgb { r: 255, g: 0, b: 0 },
            "One render tick should have painted the part"
        );
    }
}
