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
    io::{BufRead, Write},
    path::PathBuf,
    time::Duration,
};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use lightbull::{
    config::Config,
    hardware::{Hardware, LedStrip},
    persistence::Persistence,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "bullctl", about = "Control server for APA102 LED chains")]
struct Cli {
    /// Path to the configuration file. Falls back to ./config.yaml and
    /// /etc/lightbull/config.yaml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Run the control server.
    Run,
    /// Hash a password for the `api.authentication` config key.
    Password,
    /// Cycle the LED chain through a few colors to check the wiring.
    Test,
    /// Interactively light single LEDs to map out the chain.
    Calibrate {
        /// Total number of connected LEDs.
        #[arg(short, long, default_value_t = 750)]
        number: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        CliCommand::Run => {
            let config = Config::load(cli.config.as_deref())?;
            lightbull::app::run(config).await
        }
        CliCommand::Password => password(),
        CliCommand::Test => {
            let config = Config::load(cli.config.as_deref())?;
            test(&config)
        }
        CliCommand::Calibrate { number } => {
            let config = Config::load(cli.config.as_deref())?;
            calibrate(&config, number)
        }
    }
}

fn password() -> Result<()> {
    print!("Password: ");
    std::io::stdout().flush()?;

    let mut password = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut password)
        .context("Failed to read the password")?;

    let hash = bcrypt::hash(password.trim_end_matches('\n'), bcrypt::DEFAULT_COST)
        .context("Failed to hash the password")?;

    println!("Hash: {hash}");

    Ok(())
}

/// Cycle all parts through red, green, blue and white, then light each part
/// on its own.
fn test(config: &Config) -> Result<()> {
    let persistence = Persistence::new(&config.directories.config)?;
    let hardware = Hardware::new(config, &persistence)?;
    let mut leds = hardware.leds();

    let steps: [(&str, (u8, u8, u8)); 5] = [
        ("red", (255, 0, 0)),
        ("green", (0, 255, 0)),
        ("blue", (0, 0, 255)),
        ("white", (255, 255, 255)),
        ("off", (0, 0, 0)),
    ];

    for (name, (r, g, b)) in steps {
        println!("Setting color of all parts to {name}");
        leds.set_color_all(r, g, b);
        leds.update()?;
        std::thread::sleep(Duration::from_secs(5));
    }

    for part in leds.parts().to_vec() {
        println!("Setting color of {part} to red");
        leds.set_color_all(0, 0, 0);
        leds.set_color_all_part(&part, 255, 0, 0);
        leds.update()?;
        std::thread::sleep(Duration::from_secs(5));
    }

    Ok(())
}

/// Read LED ids from stdin and light exactly that LED, ignoring the part
/// definitions.
fn calibrate(config: &Config, number: usize) -> Result<()> {
    if number == 0 {
        anyhow::bail!("At least one LED is needed for calibration");
    }

    let mut leds = LedStrip::new();
    leds.add_part("calibrate", 0, number - 1);
    leds.init(&config.leds)?;

    let stdin = std::io::stdin();

    loop {
        print!("Enter LED ID: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }

        let Ok(id) = line.trim().parse::<usize>() else {
            println!("Invalid number");
            continue;
        };

        if id >= number {
            println!("ID out of range");
            continue;
        }

        leds.set_color_all(0, 0, 0);
        leds.set_color("calibrate", id, 255, 0, 0);
        leds.update()?;
    }
}
