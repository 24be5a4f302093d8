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

// Ranged playback server for MCAP recordings
//
// Streams a recorded MCAP file to WebSocket viewers as if it were live:
// - Paces messages by their log timestamps at an adjustable speed
// - Supports play, pause, seek and speed changes from any viewer
// - Broadcasts the current playback time and state
// - Advertises each topic as a channel the first time it is played

pub mod clock;
pub mod config;
pub mod control;
pub mod error;
pub mod mcap_player;
pub mod playback;
pub mod protocol;
pub mod server;
pub mod sink;
pub mod source;
pub mod time_tracker;

// Re-export main types
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{load_config, load_config_with_env, PlaybackConfig};
pub use control::{PlaybackListener, ServerListener};
pub use error::{PlaybackError, Result};
pub use mcap_player::{McapPlayer, PlayerOptions};
pub use playback::{LoopSettings, PlaybackLoop};
pub use protocol::{
    Capability, PlaybackCommand, PlaybackControlRequest, PlaybackState, PlaybackStatus,
    ServerInfo,
};
pub use server::{ServerHandle, ServerSettings, WebSocketServer};
pub use sink::{ChannelDescriptor, ChannelId, PlaybackSink, SchemaDescriptor};
pub use source::{clamp_speed, PlaybackSource, MIN_PLAYBACK_SPEED};
pub use time_tracker::TimeTracker;
