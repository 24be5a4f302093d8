// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Per-viewer connection task

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashSet;
use tokio::net::TcpStream;
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{ServerEvent, ServerState};
use crate::protocol::{ClientMessage, ServerMessage, StatusLevel};
use crate::sink::ChannelId;

/// Outcome of handling one frame from the viewer
enum Flow {
    Continue,
    Close,
}

fn json_frame(message: &ServerMessage) -> Result<Message> {
    Ok(Message::text(serde_json::to_string(message)?))
}

fn status_frame(level: StatusLevel, message: impl Into<String>) -> Result<Message> {
    json_frame(&ServerMessage::Status {
        level,
        message: message.into(),
    })
}

/// Every advertised channel and the last playback state, if any
fn catch_up_frames(state: &ServerState) -> Result<Vec<Message>> {
    let mut frames = Vec::new();

    let channels = state.channels();
    if !channels.is_empty() {
        frames.push(json_frame(&ServerMessage::Advertise { channels })?);
    }

    let last_state = state.last_state.borrow().clone();
    if let Some(playback_state) = last_state {
        frames.push(json_frame(&ServerMessage::PlaybackState(playback_state))?);
    }

    Ok(frames)
}

/// Serve one viewer until it disconnects or the server shuts down
pub(super) async fn serve(state: &ServerState, stream: TcpStream, client_id: u32) -> Result<()> {
    let websocket = tokio_tungstenite::accept_async(stream).await?;
    let (mut outgoing, mut incoming) = websocket.split();

    // Subscribe before taking snapshots so nothing published in between is lost.
    let mut events = state.events.subscribe();
    let mut shutdown = state.shutdown.subscribe();
    if *shutdown.borrow() {
        return Ok(());
    }

    outgoing
        .send(json_frame(&ServerMessage::ServerInfo(state.info.clone()))?)
        .await?;

    for frame in catch_up_frames(state)? {
        outgoing.send(frame).await?;
    }

    let mut subscriptions: HashSet<ChannelId> = HashSet::new();

    loop {
        tokio::select! {
            frame = incoming.next() => {
                let frame = match frame {
                    Some(frame) => frame?,
                    None => break,
                };
                let (flow, reply) = handle_frame(state, client_id, frame, &mut subscriptions).await?;
                if let Some(reply) = reply {
                    outgoing.send(reply).await?;
                }
                if matches!(flow, Flow::Close) {
                    break;
                }
            }
            event = events.recv() => {
                match event {
                    Ok(ServerEvent::All(message)) => outgoing.send(message).await?,
                    Ok(ServerEvent::Channel(channel, message)) => {
                        if subscriptions.contains(&channel) {
                            outgoing.send(message).await?;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Viewer {} is falling behind, dropped {} frames", client_id, skipped);
                        // Dropped frames may include advertisements or the final state.
                        for frame in catch_up_frames(state)? {
                            outgoing.send(frame).await?;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            _ = shutdown.changed() => {
                info!("Closing viewer {} for shutdown", client_id);
                break;
            }
        }
    }

    // The peer may already be gone.
    let _ = outgoing.close().await;
    Ok(())
}

/// Apply one frame from the viewer, returning an optional direct reply
async fn handle_frame(
    state: &ServerState,
    client_id: u32,
    frame: Message,
    subscriptions: &mut HashSet<ChannelId>,
) -> Result<(Flow, Option<Message>)> {
    let text = match frame {
        Message::Text(text) => text,
        Message::Binary(_) => {
            let reply = status_frame(StatusLevel::Warning, "Binary client messages are not supported")?;
            return Ok((Flow::Continue, Some(reply)));
        }
        Message::Close(_) => return Ok((Flow::Close, None)),
        // Pings are answered by the websocket layer.
        _ => return Ok((Flow::Continue, None)),
    };

    let message: ClientMessage = match serde_json::from_str(text.as_str()) {
        Ok(message) => message,
        Err(e) => {
            warn!("Viewer {} sent an invalid message: {}", client_id, e);
            let reply = status_frame(StatusLevel::Warning, format!("Invalid message: {}", e))?;
            return Ok((Flow::Continue, Some(reply)));
        }
    };

    match message {
        ClientMessage::Subscribe { channel_ids } => {
            let unknown: Vec<ChannelId> = channel_ids
                .iter()
                .copied()
                .filter(|id| !state.advertised.contains_key(id))
                .collect();
            subscriptions.extend(
                channel_ids
                    .into_iter()
                    .filter(|id| state.advertised.contains_key(id)),
            );
            debug!("Viewer {} subscriptions: {:?}", client_id, subscriptions);

            if !unknown.is_empty() {
                let reply = status_frame(
                    StatusLevel::Warning,
                    format!("Unknown channel ids: {:?}", unknown),
                )?;
                return Ok((Flow::Continue, Some(reply)));
            }
        }
        ClientMessage::Unsubscribe { channel_ids } => {
            for id in channel_ids {
                subscriptions.remove(&id);
            }
            debug!("Viewer {} subscriptions: {:?}", client_id, subscriptions);
        }
        ClientMessage::PlaybackControlRequest(request) => {
            if let Some(playback_state) = state.listener.on_playback_control_request(request).await {
                state.publish_state(&playback_state);
            }
        }
    }

    Ok((Flow::Continue, None))
}
