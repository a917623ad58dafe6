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

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::shows::Show;

/// The closed set of change notifications flowing through the hub.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventTopic {
    ShowAdded,
    /// Properties of a show itself were changed.
    ShowChanged,
    ShowDeleted,
    VisualAdded,
    VisualChanged,
    VisualDeleted,
    GroupAdded,
    /// The group or its effect were changed.
    GroupChanged,
    GroupDeleted,
    /// The current value of a parameter was changed. Deliberately not
    /// persisted, live knob turns are ephemeral.
    ParameterChanged,
    /// At least the default value of a parameter was changed, possibly the
    /// current value too.
    ParameterDefaultChanged,
    ParameterLinksChanged,
    CurrentChanged,
}

/// A serialized show captured at publish time, while the mutation lock was
/// still held. The persistence subscriber writes exactly this data so it
/// never has to re-read the live graph.
#[derive(Debug, Clone)]
pub struct ShowSnapshot {
    pub id: Uuid,
    pub data: serde_json::Value,
}

impl ShowSnapshot {
    /// Serialize the given show into a snapshot.
    pub fn of(show: &Show) -> Self {
        Self {
            id: show.id(),
            data: serde_json::to_value(show).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// One change notification.
#[derive(Debug, Clone)]
pub struct Event {
    pub topic: EventTopic,
    /// The changed entity, already in its wire form.
    pub payload: serde_json::Value,
    /// The show the change belongs to, for the persistence subscriber.
    pub show: Option<ShowSnapshot>,
    /// The websocket connection that caused the change, so the fanout can
    /// tell the originator apart from everyone else.
    pub connection_id: Option<Uuid>,
}

/// How many events a subscriber may lag behind before publishing blocks.
pub const SUBSCRIBER_QUEUE_SIZE: usize = 256;

enum HubCommand {
    Register(Subscriber),
    Unregister(Uuid),
    Publish(Arc<Event>),
}

struct Subscriber {
    id: Uuid,
    sender: mpsc::Sender<Arc<Event>>,
}

/// In-process publish/subscribe fabric between the mutating API surface and
/// the persistence and websocket subscribers.
///
/// A single coordinator task owns the subscriber set and serializes
/// registration and publishing, so no subscriber-side locking is needed and
/// every subscriber sees events in publish order. A full subscriber queue
/// blocks the coordinator; with a handful of websocket clients at
/// human-scale mutation rates that is acceptable, a drop-on-full policy per
/// subscriber is the eventual replacement.
#[derive(Debug, Clone)]
pub struct EventHub {
    commands: mpsc::Sender<HubCommand>,
}

impl EventHub {
    /// Create the hub and spawn its coordinator task.
    pub fn new() -> Self {
        let (commands, receiver) = mpsc::channel(64);

        tokio::spawn(run(receiver));

        Self { commands }
    }

    /// Register a new subscriber, returning its id and the channel the
    /// events arrive on. The channel closes on unregistration.
    pub async fn subscribe(&self) -> (Uuid, mpsc::Receiver<Arc<Event>>) {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_QUEUE_SIZE);

        let _ = self
            .commands
            .send(HubCommand::Register(Subscriber { id, sender }))
            .await;

        (id, receiver)
    }

    /// Register a subscriber under a caller-chosen id. Used by websocket
    /// connections so that subscriber and connection share one identity.
    pub async fn subscribe_with_id(&self, id: Uuid) -> mpsc::Receiver<Arc<Event>> {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_QUEUE_SIZE);

        let _ = self
            .commands
            .send(HubCommand::Register(Subscriber { id, sender }))
            .await;

        receiver
    }

    pub async fn unsubscribe(&self, id: Uuid) {
        let _ = self.commands.send(HubCommand::Unregister(id)).await;
    }

    pub async fn publish(&self, event: Event) {
        let _ = self.commands.send(HubCommand::Publish(Arc::new(event))).await;
    }

    /// Construct an event and publish it.
    pub async fn publish_new(
        &self,
        topic: EventTopic,
        payload: serde_json::Value,
        show: Option<ShowSnapshot>,
        connection_id: Option<Uuid>,
    ) {
        self.publish(Event {
            topic,
            payload,
            show,
            connection_id,
        })
        .await;
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

async fn run(mut commands: mpsc::Receiver<HubCommand>) {
    let mut subscribers: Vec<Subscriber> = Vec::new();

    while let Some(command) = commands.recv().await {
        match command {
            HubCommand::Register(subscriber) => subscribers.push(subscriber),
            // Dropping the sender closes the subscriber's channel, which
            // lets its egress task terminate.
            HubCommand::Unregister(id) => subscribers.retain(|subscriber| subscriber.id != id),
            HubCommand::Publish(event) => {
                for subscriber in &subscribers {
                    // A closed receiver means the subscriber is gone but did
                    // not unregister yet; skip it, the unregister will come.
                    let _ = subscriber.sender.send(event.clone()).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use similar_asserts::assert_eq;

    use super::*;

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let hub = EventHub::new();
        let (_id, mut events) = hub.subscribe().await;

        let connection = Uuid::new_v4();
        hub.publish_new(EventTopic::ShowAdded, json!({"name": "a"}), None, None)
            .await;
        hub.publish_new(
            EventTopic::ShowChanged,
            json!({"name": "b"}),
            None,
            Some(connection),
        )
        .await;

        let first = events.recv().await.expect("The first event should arrive");
        assert_eq!(first.topic, EventTopic::ShowAdded);
        assert_eq!(first.connection_id, None);

        let second = events.recv().await.expect("The second event should arrive");
        assert_eq!(second.topic, EventTopic::ShowChanged);
        assert_eq!(
            second.connection_id,
            Some(connection),
            "The originating connection should travel with the event"
        );
    }

    #[tokio::test]
    async fn every_subscriber_gets_the_event() {
        let hub = EventHub::new();
        let (_first_id, mut first) = hub.subscribe().await;
        let (_second_id, mut second) = hub.subscribe().await;

        hub.publish_new(EventTopic::CurrentChanged, json!(null), None, None)
            .await;

        assert_eq!(first.recv().await.unwrap().topic, EventTopic::CurrentChanged);
        assert_eq!(
            second.recv().await.unwrap().topic,
            EventTopic::CurrentChanged
        );
    }

    #[tokio::test]
    async fn unsubscribing_closes_the_channel() {
        let hub = EventHub::new();
        let (id, mut events) = hub.subscribe().await;

        hub.unsubscribe(id).await;
        hub.publish_new(EventTopic::ShowAdded, json!(null), None, None)
            .await;

        assert!(
            events.recv().await.is_none(),
            "The channel should close once the subscriber is unregistered"
        );
    }

    #[test]
    fn topics_serialize_to_their_wire_names() {
        assert_eq!(EventTopic::ShowAdded.to_string(), "show_added");
        assert_eq!(
            EventTopic::ParameterDefaultChanged.to_string(),
            "parameter_default_changed"
        );
        assert_eq!(
            serde_json::to_value(EventTopic::ParameterLinksChanged).unwrap(),
            json!("parameter_links_changed")
        );
        assert_eq!(EventTopic::CurrentChanged.to_string(), "current_changed");
    }
}
