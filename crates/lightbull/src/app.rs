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

//! The glue between all components: hardware, shows, events, persistence,
//! the render loop and the API server.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::{
    api::{self, AppState, JwtManager},
    config::Config,
    events::EventHub,
    hardware::Hardware,
    persistence::Persistence,
    render,
    shows::ShowCollection,
};

/// Bring the whole controller up and serve until the process is told to
/// stop.
///
/// Boot order matters: persistence first (everything stores through it),
/// then the hardware, then the shows from disk, then the long-running tasks
/// and finally the listener.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let persistence = Arc::new(
        Persistence::new(&config.directories.config)
            .context("Failed to set up the persistence store")?,
    );

    let hardware = Arc::new(
        Hardware::new(&config, &persistence).context("Failed to initialize the hardware")?,
    );

    let shows = Arc::new(ShowCollection::new());
    {
        let mut state = shows.write();
        for show in persistence.load_shows() {
            state.append_show(show);
        }
        info!("Loaded {} shows", state.shows().len());
    }

    let hub = EventHub::new();
    persistence.clone().spawn_event_subscriber(&hub);

    render::spawn(shows.clone(), hardware.clone(), config.leds.fps);

    let jwt = Arc::new(JwtManager::new(&persistence).context("Failed to prepare the JWT keys")?);

    let state = AppState {
        shows,
        hub,
        persistence,
        jwt,
        hardware,
        auth_hash: config.api.authentication.clone(),
    };

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.api.listen))
        .await
        .with_context(|| format!("Failed to listen on port {}", config.api.listen))?;
    info!("API listening on port {}", config.api.listen);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("The API server failed")?;

    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let interrupt = tokio::signal::ctrl_c();

    let mut terminate = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
    {
        Ok(signal) => signal,
        Err(_) => {
            let _ = interrupt.await;
            return;
        }
    };

    tokio::select! {
        _ = interrupt => {}
        _ = terminate.recv() => {}
    }

    info!("Shutting down");
}
