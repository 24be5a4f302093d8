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

// Playback source trait for ranged playback backends

use std::time::Duration;

use crate::error::Result;
use crate::protocol::{PlaybackState, PlaybackStatus};
use crate::sink::PlaybackSink;

/// Slowest playback speed a source will accept
pub const MIN_PLAYBACK_SPEED: f64 = 0.01;

/// Clamp a requested playback speed into `[MIN_PLAYBACK_SPEED, inf)`
///
/// NaN and infinite values fall back to the minimum.
pub fn clamp_speed(speed: f64) -> f64 {
    if speed.is_finite() && speed >= MIN_PLAYBACK_SPEED {
        speed
    } else {
        MIN_PLAYBACK_SPEED
    }
}

/// A data source that supports ranged playback
///
/// Implementations track the playback status and position, pace message
/// delivery according to log timestamps and playback speed, and write the
/// paced output to a [`PlaybackSink`]. The control listener and the pacing
/// loop only talk to this trait, so any recorded format can be served by
/// implementing it.
pub trait PlaybackSource: Send {
    /// `(start, end)` log-time bounds of the data in nanoseconds
    fn time_range(&self) -> (u64, u64);

    /// Begin or resume playback. No-op once playback has ended.
    fn play(&mut self);

    /// Pause playback
    fn pause(&mut self);

    /// Move to `log_time`, clamped into the time range
    ///
    /// Leaves the source in `Paused` if playback had ended. On error the
    /// previous position is kept.
    fn seek(&mut self, log_time: u64) -> Result<()>;

    /// Set the playback speed multiplier (1.0 is real time)
    fn set_playback_speed(&mut self, speed: f64);

    fn status(&self) -> PlaybackStatus;

    /// Current playback position in nanoseconds
    fn current_time(&self) -> u64;

    fn playback_speed(&self) -> f64;

    /// Log the next message if it is due, or return how long to wait
    ///
    /// Returns `Ok(Some(delay))` when the caller should sleep before calling
    /// again, and `Ok(None)` when a message was logged, playback just ended,
    /// or playback is not active. Callers should sleep outside of any lock so
    /// control requests keep flowing.
    fn log_next_message(&mut self, sink: &dyn PlaybackSink) -> Result<Option<Duration>>;

    /// State snapshot for a `playbackState` message
    fn snapshot(&self, did_seek: bool, request_id: Option<String>) -> PlaybackState {
        PlaybackState {
            current_time: self.current_time(),
            playback_speed: self.playback_speed(),
            status: self.status(),
            did_seek,
            request_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_speed() {
        assert_eq!(clamp_speed(1.0), 1.0);
        assert_eq!(clamp_speed(MIN_PLAYBACK_SPEED), MIN_PLAYBACK_SPEED);
        assert_eq!(clamp_speed(0.0), MIN_PLAYBACK_SPEED);
        assert_eq!(clamp_speed(-2.0), MIN_PLAYBACK_SPEED);
        assert_eq!(clamp_speed(f64::NAN), MIN_PLAYBACK_SPEED);
        assert_eq!(clamp_speed(f64::INFINITY), MIN_PLAYBACK_SPEED);
        assert_eq!(clamp_speed(250.0), 250.0);
    }
}
