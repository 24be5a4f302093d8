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

// Configuration types for mcap-playback

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::playback::LoopSettings;
use crate::server::ServerSettings;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct PlaybackConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub playback: PlaybackSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// WebSocket server configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Name shown to viewers; defaults to the recording's file name
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            name: None,
            event_queue_capacity: default_event_queue_capacity(),
        }
    }
}

impl ServerConfig {
    pub fn settings(&self) -> ServerSettings {
        ServerSettings {
            host: self.host.clone(),
            port: self.port,
            event_queue_capacity: self.event_queue_capacity,
        }
    }
}

/// Pacing configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PlaybackSettings {
    #[serde(default = "default_initial_speed")]
    pub initial_speed: f64,

    #[serde(default = "default_idle_poll_interval_ms")]
    pub idle_poll_interval_ms: u64,

    #[serde(default = "default_max_sleep_ms")]
    pub max_sleep_ms: u64,

    /// Upper bound on time broadcasts per second of log time
    #[serde(default = "default_time_notify_hz")]
    pub time_notify_hz: u32,

    /// Start playing as soon as the server is up
    #[serde(default)]
    pub autoplay: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            initial_speed: default_initial_speed(),
            idle_poll_interval_ms: default_idle_poll_interval_ms(),
            max_sleep_ms: default_max_sleep_ms(),
            time_notify_hz: default_time_notify_hz(),
            autoplay: false,
        }
    }
}

impl PlaybackSettings {
    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            idle_poll_interval: Duration::from_millis(self.idle_poll_interval_ms),
            max_sleep: Duration::from_millis(self.max_sleep_ms),
        }
    }

    pub fn notify_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.time_notify_hz.max(1)))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"

    #[serde(default = "default_log_format")]
    pub format: String, // "text", "json"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8765
}

fn default_event_queue_capacity() -> usize {
    1024
}

fn default_initial_speed() -> f64 {
    1.0
}

fn default_idle_poll_interval_ms() -> u64 {
    10
}

fn default_max_sleep_ms() -> u64 {
    1000
}

fn default_time_notify_hz() -> u32 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlaybackConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8765);
        assert_eq!(config.server.name, None);
        assert_eq!(config.playback.initial_speed, 1.0);
        assert!(!config.playback.autoplay);
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn test_derived_settings() {
        let playback = PlaybackSettings::default();
        let loop_settings = playback.loop_settings();
        assert_eq!(loop_settings.idle_poll_interval, Duration::from_millis(10));
        assert_eq!(loop_settings.max_sleep, Duration::from_secs(1));
        assert_eq!(playback.notify_interval(), Duration::from_nanos(16_666_666));

        let server = ServerConfig::default().settings();
        assert_eq!(server, ServerSettings::default());
    }
}
