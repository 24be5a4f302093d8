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

//! Wire protocol spoken between the playback server and its viewers.
//!
//! Control traffic travels as JSON text frames tagged by `op`. Message data
//! and time updates travel as binary frames:
//!
//! ```text
//! 0x01 | channel_id: u32 LE | log_time: u64 LE | payload...
//! 0x02 | timestamp: u64 LE
//! ```

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::sink::{ChannelDescriptor, ChannelId};

/// Playback status reported to viewers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    #[default]
    Paused,
    Playing,
    Ended,
}

/// Play/pause command carried by a control request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackCommand {
    Play,
    Pause,
}

/// Request from a viewer to change the playback state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackControlRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback_command: Option<PlaybackCommand>,
    #[serde(default = "default_playback_speed")]
    pub playback_speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seek_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl PlaybackControlRequest {
    pub fn play(playback_speed: f64) -> Self {
        Self {
            playback_command: Some(PlaybackCommand::Play),
            playback_speed,
            seek_time: None,
            request_id: None,
        }
    }

    pub fn pause(playback_speed: f64) -> Self {
        Self {
            playback_command: Some(PlaybackCommand::Pause),
            playback_speed,
            seek_time: None,
            request_id: None,
        }
    }

    pub fn with_seek(mut self, seek_time: u64) -> Self {
        self.seek_time = Some(seek_time);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Snapshot of the playback state sent back to viewers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub current_time: u64,
    pub playback_speed: f64,
    pub status: PlaybackStatus,
    pub did_seek: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Capabilities advertised in `serverInfo`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    RangedPlayback,
    Time,
}

/// First message a viewer receives after connecting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub name: String,
    pub capabilities: Vec<Capability>,
    pub data_start_time: u64,
    pub data_end_time: u64,
    pub session_id: String,
}

/// Channel description as it appears in an `advertise` message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdvertisedChannel {
    pub id: ChannelId,
    pub topic: String,
    pub encoding: String,
    pub schema_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_encoding: Option<String>,
    pub schema: String,
}

/// Schema encodings whose definitions are plain text
const TEXT_SCHEMA_ENCODINGS: &[&str] = &["jsonschema", "ros1msg", "ros2msg", "ros2idl", "omgidl"];

impl AdvertisedChannel {
    pub fn new(id: ChannelId, descriptor: &ChannelDescriptor) -> Self {
        let (schema_name, schema_encoding, schema) = match &descriptor.schema {
            Some(schema) => {
                let text = if TEXT_SCHEMA_ENCODINGS.contains(&schema.encoding.as_str()) {
                    String::from_utf8_lossy(&schema.data).into_owned()
                } else {
                    BASE64.encode(&schema.data)
                };
                (schema.name.clone(), Some(schema.encoding.clone()), text)
            }
            None => (String::new(), None, String::new()),
        };

        Self {
            id,
            topic: descriptor.topic.clone(),
            encoding: descriptor.message_encoding.clone(),
            schema_name,
            schema_encoding,
            schema,
        }
    }
}

/// Severity of a `status` message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// Text messages sent from a viewer to the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ClientMessage {
    Subscribe {
        #[serde(rename = "channelIds")]
        channel_ids: Vec<ChannelId>,
    },
    Unsubscribe {
        #[serde(rename = "channelIds")]
        channel_ids: Vec<ChannelId>,
    },
    PlaybackControlRequest(PlaybackControlRequest),
}

/// Text messages sent from the server to viewers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ServerMessage {
    ServerInfo(ServerInfo),
    Advertise { channels: Vec<AdvertisedChannel> },
    PlaybackState(PlaybackState),
    Status { level: StatusLevel, message: String },
}

/// Opcodes of binary frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BinaryOpcode {
    MessageData = 0x01,
    Time = 0x02,
}

/// Binary frames decoded on the viewer side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryMessage {
    MessageData {
        channel_id: ChannelId,
        log_time: u64,
        payload: Vec<u8>,
    },
    Time {
        timestamp: u64,
    },
}

/// Encode a message data frame
pub fn encode_message_data(channel_id: ChannelId, log_time: u64, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(1 + 4 + 8 + payload.len());
    frame.push(BinaryOpcode::MessageData as u8);
    frame.extend_from_slice(&channel_id.to_le_bytes());
    frame.extend_from_slice(&log_time.to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Encode a time update frame
pub fn encode_time(timestamp: u64) -> Vec<u8> {
    let mut frame = Vec::with_capacity(1 + 8);
    frame.push(BinaryOpcode::Time as u8);
    frame.extend_from_slice(&timestamp.to_le_bytes());
    frame
}

/// Decode a binary frame, returning `None` for unknown opcodes or truncated frames
pub fn decode_binary(frame: &[u8]) -> Option<BinaryMessage> {
    let (&opcode, rest) = frame.split_first()?;
    match opcode {
        op if op == BinaryOpcode::MessageData as u8 => {
            let channel_id = u32::from_le_bytes(rest.get(..4)?.try_into().ok()?);
            let log_time = u64::from_le_bytes(rest.get(4..12)?.try_into().ok()?);
            Some(BinaryMessage::MessageData {
                channel_id,
                log_time,
                payload: rest[12..].to_vec(),
            })
        }
        op if op == BinaryOpcode::Time as u8 => {
            let timestamp = u64::from_le_bytes(rest.get(..8)?.try_into().ok()?);
            Some(BinaryMessage::Time { timestamp })
        }
        _ => None,
    }
}

fn default_playback_speed() -> f64 {
    1.0
}
