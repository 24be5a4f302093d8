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

// Output side of the player: where paced messages and time updates go

use bytes::Bytes;

use crate::protocol::PlaybackState;

/// Identifier of an output channel, assigned by the sink
pub type ChannelId = u32;

/// Schema attached to a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    pub name: String,
    pub encoding: String,
    pub data: Bytes,
}

/// Everything a sink needs to know to create an output channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDescriptor {
    pub topic: String,
    pub message_encoding: String,
    pub schema: Option<SchemaDescriptor>,
}

/// Destination for paced playback output
///
/// Calls happen while the player lock is held, so implementations must not
/// block: queue the work and return.
pub trait PlaybackSink: Send + Sync {
    /// Announce the current playback position
    fn broadcast_time(&self, timestamp_ns: u64);

    /// Push a playback state to every viewer
    fn broadcast_playback_state(&self, state: &PlaybackState);

    /// Return the channel for `descriptor.topic`, creating it if needed
    fn add_channel(&self, descriptor: &ChannelDescriptor) -> ChannelId;

    /// Log one message payload on a channel, tagged with its original log time
    fn log(&self, channel: ChannelId, payload: &[u8], log_time_ns: u64);
}
