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

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::protocol::{PlaybackCommand, PlaybackControlRequest, PlaybackState};
use crate::source::PlaybackSource;

/// Callbacks a server invokes on behalf of its viewers
#[async_trait]
pub trait ServerListener: Send + Sync {
    /// Apply a playback control request
    ///
    /// The returned state is sent back to viewers. `None` means the request
    /// produced no state change worth reporting.
    async fn on_playback_control_request(
        &self,
        request: PlaybackControlRequest,
    ) -> Option<PlaybackState>;
}

/// Control interface that applies viewer requests to a shared player
pub struct PlaybackListener<P> {
    player: Arc<Mutex<P>>,
}

impl<P> PlaybackListener<P> {
    pub fn new(player: Arc<Mutex<P>>) -> Self {
        Self { player }
    }
}

#[async_trait]
impl<P: PlaybackSource + 'static> ServerListener for PlaybackListener<P> {
    async fn on_playback_control_request(
        &self,
        request: PlaybackControlRequest,
    ) -> Option<PlaybackState> {
        let mut player = self.player.lock().await;

        info!(
            "Processing control request: command={:?} speed={} seek={:?}",
            request.playback_command, request.playback_speed, request.seek_time
        );

        let mut did_seek = false;
        if let Some(seek_time) = request.seek_time {
            match player.seek(seek_time) {
                Ok(()) => did_seek = true,
                Err(e) => warn!("Seek to {} failed: {}", seek_time, e),
            }
        }

        player.set_playback_speed(request.playback_speed);

        match request.playback_command {
            Some(PlaybackCommand::Play) => player.play(),
            Some(PlaybackCommand::Pause) => player.pause(),
            None => {}
        }

        Some(player.snapshot(did_seek, request.request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PlaybackError, Result};
    use crate::protocol::PlaybackStatus;
    use crate::sink::PlaybackSink;
    use std::time::Duration;

    /// Source that records calls and can be told to fail seeks
    #[derive(Default)]
    struct ScriptedSource {
        calls: Vec<String>,
        fail_seek: bool,
        status: PlaybackStatus,
        current_time: u64,
        speed: f64,
    }

    impl PlaybackSource for ScriptedSource {
        fn time_range(&self) -> (u64, u64) {
            (0, 1_000)
        }

        fn play(&mut self) {
            self.calls.push("play".to_string());
            self.status = PlaybackStatus::Playing;
        }

        fn pause(&mut self) {
            self.calls.push("pause".to_string());
            self.status = PlaybackStatus::Paused;
        }

        fn seek(&mut self, log_time: u64) -> Result<()> {
            self.calls.push(format!("seek {}", log_time));
            if self.fail_seek {
                return Err(PlaybackError::MissingSummary("gone.mcap".into()));
            }
            self.current_time = log_time;
            Ok(())
        }

        fn set_playback_speed(&mut self, speed: f64) {
            self.calls.push(format!("speed {}", speed));
            self.speed = speed;
        }

        fn status(&self) -> PlaybackStatus {
            self.status
        }

        fn current_time(&self) -> u64 {
            self.current_time
        }

        fn playback_speed(&self) -> f64 {
            self.speed
        }

        fn log_next_message(&mut self, _sink: &dyn PlaybackSink) -> Result<Option<Duration>> {
            Ok(None)
        }
    }

    fn listener(source: ScriptedSource) -> (Arc<Mutex<ScriptedSource>>, PlaybackListener<ScriptedSource>) {
        let player = Arc::new(Mutex::new(source));
        (player.clone(), PlaybackListener::new(player))
    }

    #[tokio::test]
    async fn test_request_applies_seek_speed_then_command() {
        let (player, listener) = listener(ScriptedSource::default());
        let request = PlaybackControlRequest::play(2.0)
            .with_seek(400)
            .with_request_id("abc");

        let state = listener.on_playback_control_request(request).await.unwrap();

        assert_eq!(
            player.lock().await.calls,
            vec!["seek 400", "speed 2", "play"]
        );
        assert_eq!(state.current_time, 400);
        assert_eq!(state.playback_speed, 2.0);
        assert_eq!(state.status, PlaybackStatus::Playing);
        assert!(state.did_seek);
        assert_eq!(state.request_id.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_failed_seek_reports_did_seek_false() {
        let (player, listener) = listener(ScriptedSource {
            fail_seek: true,
            current_time: 10,
            ..ScriptedSource::default()
        });

        let request = PlaybackControlRequest::pause(1.0).with_seek(400);
        let state = listener.on_playback_control_request(request).await.unwrap();

        assert!(!state.did_seek);
        assert_eq!(state.current_time, 10);
        assert_eq!(state.status, PlaybackStatus::Paused);
        assert_eq!(player.lock().await.calls, vec!["seek 400", "speed 1", "pause"]);
    }

    #[tokio::test]
    async fn test_request_without_command_only_sets_speed() {
        let (player, listener) = listener(ScriptedSource::default());
        let request = PlaybackControlRequest {
            playback_command: None,
            playback_speed: 0.5,
            seek_time: None,
            request_id: None,
        };

        let state = listener.on_playback_control_request(request).await.unwrap();

        assert!(!state.did_seek);
        assert_eq!(state.request_id, None);
        assert_eq!(player.lock().await.calls, vec!["speed 0.5"]);
    }
}
