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
    fs,
    io,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{de::DeserializeOwned, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    events::{EventHub, EventTopic, ShowSnapshot},
    shows::Show,
};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("cannot create the configuration directory: {0}")]
    CreateDirectory(io::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Stores dynamic state on disk: one JSON file per show under `shows/`, plus
/// named configuration blobs like the JWT key or the ethernet settings in
/// the configuration directory itself.
#[derive(Debug)]
pub struct Persistence {
    config_dir: PathBuf,
    shows_dir: PathBuf,
}

impl Persistence {
    /// Create the persistence store, creating the directories if necessary.
    pub fn new(config_dir: &Path) -> Result<Self, PersistenceError> {
        let shows_dir = config_dir.join("shows");

        fs::create_dir_all(config_dir).map_err(PersistenceError::CreateDirectory)?;
        fs::create_dir_all(&shows_dir).map_err(PersistenceError::CreateDirectory)?;

        Ok(Self {
            config_dir: config_dir.to_owned(),
            shows_dir,
        })
    }

    /// Store a configuration blob as pretty-printed JSON. Secret blobs are
    /// only readable by the owning user.
    pub fn save_config<T: Serialize>(
        &self,
        name: &str,
        data: &T,
        secret: bool,
    ) -> Result<(), PersistenceError> {
        let path = self.config_path(name);

        fs::write(&path, serde_json::to_vec_pretty(data)?)?;

        let mode = if secret { 0o600 } else { 0o644 };
        fs::set_permissions(&path, fs::Permissions::from_mode(mode))?;

        Ok(())
    }

    /// Load a configuration blob.
    pub fn load_config<T: DeserializeOwned>(&self, name: &str) -> Result<T, PersistenceError> {
        let data = fs::read(self.config_path(name))?;

        Ok(serde_json::from_slice(&data)?)
    }

    /// Whether a configuration blob exists. Does not look into the file.
    pub fn has_config(&self, name: &str) -> bool {
        self.config_path(name).is_file()
    }

    /// Write a show to its file.
    pub fn save_show(&self, show: &Show) -> Result<(), PersistenceError> {
        fs::write(
            self.show_path(show.id()),
            serde_json::to_vec_pretty(show)?,
        )?;

        Ok(())
    }

    /// Write an already serialized show snapshot to its file.
    pub fn save_show_snapshot(&self, snapshot: &ShowSnapshot) -> Result<(), PersistenceError> {
        fs::write(
            self.show_path(snapshot.id),
            serde_json::to_vec_pretty(&snapshot.data)?,
        )?;

        Ok(())
    }

    /// Remove a show's file.
    pub fn delete_show(&self, id: Uuid) -> Result<(), PersistenceError> {
        fs::remove_file(self.show_path(id))?;

        Ok(())
    }

    /// Load every show from the shows directory. Files that cannot be read
    /// or parsed are skipped with a log line, a single corrupt show should
    /// not keep the controller from booting.
    pub fn load_shows(&self) -> Vec<Show> {
        let entries = match fs::read_dir(&self.shows_dir) {
            Ok(entries) => entries,
            Err(error) => {
                warn!("Failed to list the shows directory: {error}");
                return Vec::new();
            }
        };

        let mut shows = Vec::new();

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|extension| extension.to_str()) != Some("json") {
                continue;
            }

            match fs::read(&path).map_err(PersistenceError::from).and_then(|data| {
                serde_json::from_slice::<Show>(&data).map_err(PersistenceError::from)
            }) {
                Ok(show) => shows.push(show),
                Err(error) => {
                    warn!("Error while loading show from {}: {error}", path.display());
                }
            }
        }

        if shows.is_empty() {
            info!("No shows loaded");
        }

        shows
    }

    /// Subscribe to the event hub and keep the on-disk shows in sync with
    /// the published changes.
    ///
    /// Deleted shows lose their file, changed shows get rewritten from the
    /// snapshot carried by the event. Current-value parameter changes are
    /// deliberately not written, only default values are durable. Failures
    /// are logged and never reach the publisher.
    pub fn spawn_event_subscriber(self: Arc<Self>, hub: &EventHub) -> JoinHandle<()> {
        let hub = hub.clone();

        tokio::spawn(async move {
            let (_id, mut events) = hub.subscribe().await;

            while let Some(event) = events.recv().await {
                let Some(show) = &event.show else {
                    continue;
                };

                match event.topic {
                    EventTopic::ShowDeleted => {
                        if let Err(error) = self.delete_show(show.id) {
                            warn!("Failed to delete the show file for {}: {error}", show.id);
                        }
                    }
                    EventTopic::ParameterChanged => {}
                    _ => {
                        if let Err(error) = self.save_show_snapshot(show) {
                            warn!("Failed to write the show file for {}: {error}", show.id);
                        }
                    }
                }
            }
        })
    }

    fn config_path(&self, name: &str) -> PathBuf {
        self.config_dir.join(format!("{name}.json"))
    }

    fn show_path(&self, id: Uuid) -> PathBuf {
        self.shows_dir.join(format!("{id}.json"))
    }
}

#[cfg(test)]
mod test {
    use serde::Deserialize;
    use serde_json::json;
    use similar_asserts::assert_eq;

    use super::*;
    use crate::{
        events::Event,
        shows::{effects::EffectKind, ShowState},
    };

    fn store() -> (tempfile::TempDir, Persistence) {
        let dir = tempfile::tempdir().expect("We should be able to create a temporary directory");
        let persistence = Persistence::new(dir.path())
            .expect("We should be able to create the persistence store");

        (dir, persistence)
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Blob {
        key: String,
    }

    #[test]
    fn config_blob_round_trip() {
        let (_dir, persistence) = store();

        assert!(!persistence.has_config("jwt"));

        let blob = Blob { key: "secret".to_owned() };
        persistence
            .save_config("jwt", &blob, true)
            .expect("We should be able to save a config blob");

        assert!(persistence.has_config("jwt"));
        assert_eq!(
            persistence
                .load_config::<Blob>("jwt")
                .expect("We should be able to load the config blob"),
            blob
        );
    }

    #[test]
    fn secret_blobs_are_private() {
        let (dir, persistence) = store();

        persistence
            .save_config("jwt", &Blob { key: "secret".to_owned() }, true)
            .expect("We should be able to save a secret blob");
        persistence
            .save_config("ethernet", &Blob { key: "public".to_owned() }, false)
            .expect("We should be able to save a public blob");

        let mode = |name: &str| {
            fs::metadata(dir.path().join(name))
                .expect("The blob file should exist")
                .permissions()
                .mode()
                & 0o777
        };

        assert_eq!(mode("jwt.json"), 0o600, "A secret blob should be private");
        assert_eq!(mode("ethernet.json"), 0o644);
    }

    #[test]
    fn show_round_trip() {
        let (_dir, persistence) = store();

        let mut state = ShowState::default();
        let show_id = state.new_show("Festival", true).unwrap().id();
        let visual_id = state
            .show_by_id_mut(show_id)
            .unwrap()
            .new_visual("Warmup")
            .id();
        state
            .show_by_id_mut(show_id)
            .unwrap()
            .find_visual_mut(visual_id)
            .unwrap()
            .new_group(vec!["head_left".to_owned()], EffectKind::Rainbow);

        persistence
            .save_show(state.show_by_id(show_id).unwrap())
            .expect("We should be able to save a show");

        let shows = persistence.load_shows();
        assert_eq!(shows.len(), 1);
        assert_eq!(shows[0].id(), show_id);
        assert_eq!(shows[0].name(), "Festival");
        assert_eq!(shows[0].visuals()[0].groups()[0].effect().kind(), EffectKind::Rainbow);

        persistence
            .delete_show(show_id)
            .expect("We should be able to delete the show file");
        assert!(persistence.load_shows().is_empty());
    }

    #[test]
    fn corrupt_show_files_are_skipped() {
        let (dir, persistence) = store();

        fs::write(dir.path().join("shows/broken.json"), b"{ not json")
            .expect("We should be able to write a broken show file");

        assert!(
            persistence.load_shows().is_empty(),
            "A corrupt show file should be skipped, not fatal"
        );
    }

    #[tokio::test]
    async fn event_subscriber_writes_and_deletes() {
        let (_dir, persistence) = store();
        let persistence = Arc::new(persistence);

        let hub = EventHub::new();
        persistence.clone().spawn_event_subscriber(&hub);

        let mut state = ShowState::default();
        let show_id = state.new_show("Festival", false).unwrap().id();
        let snapshot = ShowSnapshot::of(state.show_by_id(show_id).unwrap());

        hub.publish(Event {
            topic: EventTopic::ShowAdded,
            payload: json!(null),
            show: Some(snapshot.clone()),
            connection_id: None,
        })
        .await;

        // The subscriber runs on its own task, give it a moment.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(persistence.load_shows().len(), 1);

        hub.publish(Event {
            topic: EventTopic::ShowDeleted,
            payload: json!(null),
            show: Some(snapshot.clone()),
            connection_id: None,
        })
        .await;

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(persistence.load_shows().is_empty());

        // A live parameter change is ephemeral and must not touch the disk.
        hub.publish(Event {
            topic: EventTopic::ParameterChanged,
            payload: json!(null),
            show: Some(snapshot),
            connection_id: None,
        })
        .await;

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(
            persistence.load_shows().is_empty(),
            "A parameter_changed event should not rewrite the show file"
        );
    }
}
