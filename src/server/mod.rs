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

//! WebSocket server that fans playback output out to viewers
//!
//! The server is the concrete [`PlaybackSink`]: every sink call is turned
//! into a pre-encoded frame and pushed onto a bounded broadcast queue. Each
//! connected viewer runs in its own task, draining that queue and applying
//! its own channel subscriptions. A slow viewer loses the oldest frames
//! instead of slowing down playback.

mod client;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::control::ServerListener;
use crate::error::Result;
use crate::protocol::{
    encode_message_data, encode_time, AdvertisedChannel, PlaybackState, ServerInfo, ServerMessage,
};
use crate::sink::{ChannelDescriptor, ChannelId, PlaybackSink};

/// Where and how the server listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Frames buffered per viewer before the oldest are dropped
    pub event_queue_capacity: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
            event_queue_capacity: 1024,
        }
    }
}

/// Frame queued for delivery to viewers
#[derive(Debug, Clone)]
enum ServerEvent {
    /// Delivered to every viewer
    All(Message),
    /// Delivered only to viewers subscribed to the channel
    Channel(ChannelId, Message),
}

/// State shared between the handle, the accept loop and client tasks
struct ServerState {
    info: ServerInfo,
    listener: Arc<dyn ServerListener>,
    events: broadcast::Sender<ServerEvent>,
    last_state: watch::Sender<Option<PlaybackState>>,
    shutdown: watch::Sender<bool>,
    topics: DashMap<String, ChannelId>,
    advertised: DashMap<ChannelId, AdvertisedChannel>,
    clients: DashMap<u32, SocketAddr>,
    next_channel_id: AtomicU32,
    next_client_id: AtomicU32,
}

impl ServerState {
    fn publish(&self, event: ServerEvent) {
        // Sending fails only when no viewer is connected.
        let _ = self.events.send(event);
    }

    fn publish_json(&self, message: &ServerMessage) {
        match serde_json::to_string(message) {
            Ok(json) => self.publish(ServerEvent::All(Message::text(json))),
            Err(e) => error!("Failed to encode server message: {}", e),
        }
    }

    /// Broadcast a state and remember it for viewers that join later
    fn publish_state(&self, state: &PlaybackState) {
        self.last_state.send_replace(Some(state.clone()));
        self.publish_json(&ServerMessage::PlaybackState(state.clone()));
    }

    /// Advertised channels ordered by id
    fn channels(&self) -> Vec<AdvertisedChannel> {
        let mut channels: Vec<_> = self
            .advertised
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        channels.sort_by_key(|channel| channel.id);
        channels
    }
}

/// Handle to a running server
///
/// Cheap to clone. Implements [`PlaybackSink`], so it can be handed straight
/// to the pacing loop.
#[derive(Clone)]
pub struct ServerHandle {
    state: Arc<ServerState>,
    local_addr: SocketAddr,
    accept_task: Arc<JoinHandle<()>>,
}

pub struct WebSocketServer;

impl WebSocketServer {
    /// Bind and start accepting viewers in the background
    pub async fn start(
        settings: ServerSettings,
        info: ServerInfo,
        listener: Arc<dyn ServerListener>,
    ) -> Result<ServerHandle> {
        let tcp = TcpListener::bind((settings.host.as_str(), settings.port)).await?;
        let local_addr = tcp.local_addr()?;

        let (events, _) = broadcast::channel(settings.event_queue_capacity.max(1));
        let (last_state, _) = watch::channel(None);
        let (shutdown, _) = watch::channel(false);

        let state = Arc::new(ServerState {
            info,
            listener,
            events,
            last_state,
            shutdown,
            topics: DashMap::new(),
            advertised: DashMap::new(),
            clients: DashMap::new(),
            next_channel_id: AtomicU32::new(1),
            next_client_id: AtomicU32::new(1),
        });

        info!(
            "Serving '{}' on ws://{} (session {})",
            state.info.name, local_addr, state.info.session_id
        );

        let accept_state = state.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                match tcp.accept().await {
                    Ok((stream, addr)) => {
                        let state = accept_state.clone();
                        let client_id = state.next_client_id.fetch_add(1, Ordering::Relaxed);
                        tokio::spawn(async move {
                            state.clients.insert(client_id, addr);
                            info!("Viewer {} connected from {}", client_id, addr);

                            if let Err(e) = client::serve(&state, stream, client_id).await {
                                warn!("Viewer {} ({}) dropped: {}", client_id, addr, e);
                            }

                            state.clients.remove(&client_id);
                            info!("Viewer {} disconnected", client_id);
                        });
                    }
                    Err(e) => warn!("Failed to accept connection: {}", e),
                }
            }
        });

        Ok(ServerHandle {
            state,
            local_addr,
            accept_task: Arc::new(accept_task),
        })
    }
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn client_count(&self) -> usize {
        self.state.clients.len()
    }

    pub fn channels(&self) -> Vec<AdvertisedChannel> {
        self.state.channels()
    }

    /// Stop accepting viewers and close every open connection
    pub fn stop(&self) {
        self.accept_task.abort();
        self.state.shutdown.send_replace(true);
        info!("Server on {} stopped", self.local_addr);
    }
}

impl PlaybackSink for ServerHandle {
    fn broadcast_time(&self, timestamp_ns: u64) {
        self.state
            .publish(ServerEvent::All(Message::binary(encode_time(timestamp_ns))));
    }

    fn broadcast_playback_state(&self, state: &PlaybackState) {
        self.state.publish_state(state);
    }

    fn add_channel(&self, descriptor: &ChannelDescriptor) -> ChannelId {
        let id = match self.state.topics.entry(descriptor.topic.clone()) {
            Entry::Occupied(entry) => return *entry.get(),
            Entry::Vacant(entry) => {
                let id = self.state.next_channel_id.fetch_add(1, Ordering::Relaxed);
                entry.insert(id);
                id
            }
        };

        let channel = AdvertisedChannel::new(id, descriptor);
        debug!("Advertising channel {} for '{}'", id, channel.topic);
        self.state.advertised.insert(id, channel.clone());
        self.state.publish_json(&ServerMessage::Advertise {
            channels: vec![channel],
        });
        id
    }

    fn log(&self, channel: ChannelId, payload: &[u8], log_time_ns: u64) {
        let frame = encode_message_data(channel, log_time_ns, payload);
        self.state
            .publish(ServerEvent::Channel(channel, Message::binary(frame)));
    }
}
