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

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::protocol::PlaybackStatus;
use crate::sink::PlaybackSink;
use crate::source::PlaybackSource;

/// Timing of the pacing loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    /// Sleep between checks while not playing
    pub idle_poll_interval: Duration,
    /// Upper bound on a single pacing sleep
    pub max_sleep: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            idle_poll_interval: Duration::from_millis(10),
            max_sleep: Duration::from_secs(1),
        }
    }
}

/// What the loop does after releasing the player lock
enum Step {
    Idle,
    Sleep(Duration),
    Yield,
}

/// Drives a shared player, pacing its messages into a sink
pub struct PlaybackLoop<P> {
    player: Arc<Mutex<P>>,
    sink: Arc<dyn PlaybackSink>,
    settings: LoopSettings,
}

impl<P: PlaybackSource + 'static> PlaybackLoop<P> {
    pub fn new(player: Arc<Mutex<P>>, sink: Arc<dyn PlaybackSink>, settings: LoopSettings) -> Self {
        Self {
            player,
            sink,
            settings,
        }
    }

    /// Run until a storage error occurs
    ///
    /// The lock is released before every sleep so control requests are
    /// applied promptly. When playback reaches the end, one state snapshot
    /// is broadcast.
    pub async fn run(&self) -> Result<()> {
        info!("Playback loop started");
        let mut was_ended = false;

        loop {
            let playing = {
                let player = self.player.lock().await;
                let status = player.status();

                let ended = status == PlaybackStatus::Ended;
                if ended && !was_ended {
                    info!("Playback ended at {}", player.current_time());
                    self.sink
                        .broadcast_playback_state(&player.snapshot(false, None));
                }
                was_ended = ended;

                status == PlaybackStatus::Playing
            };

            let step = if playing {
                self.advance().await?
            } else {
                Step::Idle
            };

            match step {
                Step::Idle => tokio::time::sleep(self.settings.idle_poll_interval).await,
                Step::Sleep(delay) => {
                    debug!("Next message due in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                Step::Yield => tokio::task::yield_now().await,
            }
        }
    }

    /// Emit the next message or learn how long until it is due
    ///
    /// Reading a message may load a chunk from disk, so the lock is taken on
    /// the blocking pool and async workers stay free for viewers.
    async fn advance(&self) -> Result<Step> {
        let player = self.player.clone();
        let sink = self.sink.clone();
        let max_sleep = self.settings.max_sleep;

        tokio::task::spawn_blocking(move || -> Result<Step> {
            let mut player = player.blocking_lock();
            Ok(match player.log_next_message(sink.as_ref())? {
                Some(delay) => Step::Sleep(delay.min(max_sleep)),
                None => Step::Yield,
            })
        })
        .await?
    }
}
