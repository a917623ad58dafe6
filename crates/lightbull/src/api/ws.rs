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

//! The websocket side of the API: one ingress and one egress task per
//! connection, wired into the event hub.
//!
//! A fresh connection only ever receives `identified`, `unidentified` and
//! `error` frames. Once the client has identified itself with a valid token
//! the egress task also forwards the event broadcast. Outgoing frames are
//! newline-batched when several are pending, pings keep the connection
//! alive, and a peer that stops answering them is dropped.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::AppState;
use crate::events::{Event, EventTopic, ShowSnapshot, SUBSCRIBER_QUEUE_SIZE};

/// Time allowed to write a message to the peer.
const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Time allowed between two messages from the peer; pongs count.
const PONG_WAIT: Duration = Duration::from_secs(60);

/// Ping period, must be below [`PONG_WAIT`].
const PING_PERIOD: Duration = Duration::from_secs(54);

/// Maximum size of an inbound message.
const MAX_MESSAGE_SIZE: usize = 512;

/// `GET /api/ws`: upgrade to a websocket connection.
///
/// Authentication happens inside the connection with an `identify` message,
/// browsers cannot set the `Authorization` header on an upgrade request.
pub async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| client(socket, state))
}

/// The message envelope in both directions:
/// `{topic, payload, meta: {connectionId}}`.
#[derive(Debug, Serialize)]
struct Envelope {
    topic: String,
    payload: serde_json::Value,
    meta: Meta,
}

#[derive(Debug, Serialize)]
struct Meta {
    #[serde(rename = "connectionId")]
    connection_id: Option<Uuid>,
}

impl Envelope {
    fn for_event(event: &Event) -> Self {
        Self {
            topic: event.topic.to_string(),
            payload: event.payload.clone(),
            meta: Meta {
                connection_id: event.connection_id,
            },
        }
    }

    fn control(topic: &str, payload: serde_json::Value) -> Self {
        Self {
            topic: topic.to_owned(),
            payload,
            meta: Meta {
                connection_id: None,
            },
        }
    }

    fn to_text(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(text) => Some(text),
            Err(error) => {
                warn!("Failed to serialize an event for the websocket: {error}");
                None
            }
        }
    }
}

async fn client(socket: WebSocket, state: AppState) {
    let id = Uuid::new_v4();
    let authenticated = Arc::new(AtomicBool::new(false));

    let events = state.hub.subscribe_with_id(id).await;
    let (outbound, outbound_receiver) = mpsc::channel(SUBSCRIBER_QUEUE_SIZE);

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_pump(
        sink,
        events,
        outbound_receiver,
        authenticated.clone(),
    ));

    read_pump(stream, id, outbound, authenticated, &state).await;

    // The read side is done: unregistering drops our event sender, which in
    // turn lets the write pump run dry and exit.
    state.hub.unsubscribe(id).await;
    let _ = writer.await;

    debug!("Websocket connection {id} closed");
}

/// Forward events and control messages to the peer and keep it alive with
/// pings.
async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut events: mpsc::Receiver<Arc<Event>>,
    mut outbound: mpsc::Receiver<String>,
    authenticated: Arc<AtomicBool>,
) {
    let mut ping =
        tokio::time::interval_at(tokio::time::Instant::now() + PING_PERIOD, PING_PERIOD);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    // The hub closed our channel, say goodbye.
                    let _ = sink.send(Message::Close(None)).await;
                    return;
                };

                // The event broadcast is gated on a successful identify.
                if !authenticated.load(Ordering::Relaxed) {
                    continue;
                }

                let Some(mut batch) = Envelope::for_event(&event).to_text() else {
                    continue;
                };

                // More events may already be waiting, batch them into one
                // frame separated by newlines.
                while let Ok(next) = events.try_recv() {
                    if let Some(text) = Envelope::for_event(&next).to_text() {
                        batch.push('\n');
                        batch.push_str(&text);
                    }
                }

                if send(&mut sink, Message::Text(batch)).await.is_err() {
                    return;
                }
            }
            message = outbound.recv() => {
                let Some(message) = message else {
                    return;
                };

                if send(&mut sink, Message::Text(message)).await.is_err() {
                    return;
                }
            }
            _ = ping.tick() => {
                if send(&mut sink, Message::Ping(Vec::new())).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// Write with a deadline; a peer that cannot keep up is dropped.
async fn send(sink: &mut SplitSink<WebSocket, Message>, message: Message) -> Result<(), ()> {
    match tokio::time::timeout(WRITE_WAIT, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        _ => Err(()),
    }
}

/// Read and handle the peer's messages until the connection dies or the
/// peer stops answering pings.
///
/// Only pong frames extend the read deadline; a peer that keeps sending
/// data but never answers our pings is still dropped after [`PONG_WAIT`].
async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    id: Uuid,
    outbound: mpsc::Sender<String>,
    authenticated: Arc<AtomicBool>,
    state: &AppState,
) {
    let mut pong_deadline = tokio::time::Instant::now() + PONG_WAIT;

    loop {
        let message = match tokio::time::timeout_at(pong_deadline, stream.next()).await {
            // The pong deadline passed.
            Err(_) => break,
            Ok(None) => break,
            Ok(Some(Err(error))) => {
                debug!("Websocket error: {error}");
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Text(text) => {
                // Inbound frames may carry several newline-separated
                // messages.
                for line in text.split('\n').filter(|line| !line.is_empty()) {
                    handle_request(line, id, &outbound, &authenticated, state).await;
                }
            }
            Message::Pong(_) => {
                pong_deadline = tokio::time::Instant::now() + PONG_WAIT;
            }
            Message::Close(_) => break,
            // Pings are answered by the library.
            _ => {}
        }
    }
}

#[derive(Debug, Deserialize)]
struct Request {
    topic: String,
    payload: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct IdentifyPayload {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ParameterPayload {
    id: String,
    value: serde_json::Value,
}

async fn handle_request(
    raw: &str,
    id: Uuid,
    outbound: &mpsc::Sender<String>,
    authenticated: &AtomicBool,
    state: &AppState,
) {
    let Ok(request) = serde_json::from_str::<Request>(raw) else {
        send_error(outbound, "Invalid data format").await;
        return;
    };

    match request.topic.as_str() {
        "identify" => {
            let Some(payload) = request
                .payload
                .and_then(|payload| serde_json::from_value::<IdentifyPayload>(payload).ok())
            else {
                send_error(outbound, "Invalid data format").await;
                return;
            };

            if state.auth_hash.is_empty() || state.jwt.check(&payload.token) {
                authenticated.store(true, Ordering::Relaxed);
                send_control(outbound, "identified", json!({ "connectionId": id })).await;
            } else {
                send_control(outbound, "unidentified", serde_json::Value::Null).await;
            }
        }
        "parameter" => {
            if !authenticated.load(Ordering::Relaxed) {
                send_error(outbound, "Authentication required").await;
                return;
            }

            let Some(payload) = request
                .payload
                .and_then(|payload| serde_json::from_value::<ParameterPayload>(payload).ok())
            else {
                send_error(outbound, "Invalid data format").await;
                return;
            };

            if let Err(message) = handle_parameter_change(state, id, &payload).await {
                send_error(outbound, &message).await;
            }
        }
        _ => send_error(outbound, "Unknown message topic").await,
    }
}

/// A live parameter write coming in over the websocket: set the current
/// value, run the link propagation and broadcast `parameter_changed` tagged
/// with this connection.
async fn handle_parameter_change(
    state: &AppState,
    id: Uuid,
    payload: &ParameterPayload,
) -> Result<(), String> {
    let (parameter, snapshot) = {
        let mut shows = state.shows.write();
        let (show_id, visual_id, _group_id, parameter_id) = shows
            .locate_parameter(&payload.id)
            .ok_or_else(|| "Invalid or unknown ID".to_owned())?;

        let visual = shows
            .show_by_id_mut(show_id)
            .and_then(|show| show.find_visual_mut(visual_id))
            .ok_or_else(|| "Invalid or unknown ID".to_owned())?;

        visual
            .set_parameter_current(parameter_id, &payload.value)
            .map_err(|error| error.to_string())?;

        let parameter = visual
            .find_parameter(parameter_id)
            .ok_or_else(|| "Invalid or unknown ID".to_owned())?
            .clone();
        let show = shows
            .show_by_id(show_id)
            .ok_or_else(|| "Invalid or unknown ID".to_owned())?;

        (parameter, ShowSnapshot::of(show))
    };

    state
        .hub
        .publish_new(
            EventTopic::ParameterChanged,
            serde_json::to_value(&parameter).unwrap_or(serde_json::Value::Null),
            Some(snapshot),
            Some(id),
        )
        .await;

    Ok(())
}

async fn send_control(outbound: &mpsc::Sender<String>, topic: &str, payload: serde_json::Value) {
    if let Some(text) = Envelope::control(topic, payload).to_text() {
        let _ = outbound.send(text).await;
    }
}

async fn send_error(outbound: &mpsc::Sender<String>, message: &str) {
    send_control(outbound, "error", json!({ "msg": message })).await;
}
