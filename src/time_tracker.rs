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

//! Mapping between wall-clock time and playback log time
//!
//! The tracker anchors a log timestamp (`offset_ns`) to a wall-clock instant
//! and advances log time at `speed` times the wall-clock rate. Pausing and
//! speed changes fold the log time elapsed so far into `paused_elapsed_ns`
//! and re-anchor, so the reported log time never jumps.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use mcap_playback::clock::ManualClock;
//! use mcap_playback::time_tracker::TimeTracker;
//!
//! let clock = Arc::new(ManualClock::new(0));
//! let mut tracker = TimeTracker::new(1_000, 2.0, clock.clone());
//!
//! clock.advance(Duration::from_nanos(50));
//! assert_eq!(tracker.current_log_time(), 1_100);
//!
//! tracker.pause();
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(tracker.current_log_time(), 1_100);
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::source::clamp_speed;

/// Default rate for time broadcasts (~60 Hz)
pub const DEFAULT_NOTIFY_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / 60);

/// Wait returned by `seconds_until` when the speed cannot make progress
const STALLED_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct TimeTracker {
    clock: Arc<dyn Clock>,
    start_wall_ns: u64,
    offset_ns: u64,
    paused_elapsed_ns: u64,
    speed: f64,
    paused: bool,
    notify_interval_ns: u64,
    notify_last: u64,
}

impl TimeTracker {
    /// Start tracking with `offset_ns` as the log time of "now"
    pub fn new(offset_ns: u64, speed: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            start_wall_ns: clock.now_ns(),
            clock,
            offset_ns,
            paused_elapsed_ns: 0,
            speed: clamp_speed(speed),
            paused: false,
            notify_interval_ns: duration_to_ns(DEFAULT_NOTIFY_INTERVAL),
            notify_last: 0,
        }
    }

    /// Override the minimum spacing between time broadcasts
    pub fn with_notify_interval(mut self, interval: Duration) -> Self {
        self.notify_interval_ns = duration_to_ns(interval);
        self
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Current playback position in log-time nanoseconds
    pub fn current_log_time(&self) -> u64 {
        let base = self.offset_ns.saturating_add(self.paused_elapsed_ns);
        if self.paused {
            return base;
        }
        base.saturating_add(self.elapsed_log_ns())
    }

    /// Wall-clock wait until `log_time` is due, or `None` if it is due now
    pub fn seconds_until(&self, log_time: u64) -> Option<Duration> {
        let current = self.current_log_time();
        if log_time <= current {
            return None;
        }

        if self.speed <= 0.0 {
            return Some(STALLED_POLL_INTERVAL);
        }

        // Round up so that waiting the full delay always reaches `log_time`.
        let wall_ns = ((log_time - current) as f64 / self.speed).ceil();
        Some(Duration::from_nanos(wall_ns as u64))
    }

    pub fn pause(&mut self) {
        if !self.paused {
            self.paused_elapsed_ns = self.paused_elapsed_ns.saturating_add(self.elapsed_log_ns());
            self.paused = true;
        }
    }

    pub fn resume(&mut self) {
        if self.paused {
            self.start_wall_ns = self.clock.now_ns();
            self.paused = false;
        }
    }

    pub fn set_speed(&mut self, speed: f64) {
        let speed = clamp_speed(speed);
        if !self.paused {
            self.paused_elapsed_ns = self.paused_elapsed_ns.saturating_add(self.elapsed_log_ns());
            self.start_wall_ns = self.clock.now_ns();
        }
        self.speed = speed;
    }

    /// Returns `current_ns` when a time broadcast is due, rate limited
    pub fn notify(&mut self, current_ns: u64) -> Option<u64> {
        if current_ns.saturating_sub(self.notify_last) >= self.notify_interval_ns {
            self.notify_last = current_ns;
            Some(current_ns)
        } else {
            None
        }
    }

    /// Log time elapsed since the last anchor at the current speed
    fn elapsed_log_ns(&self) -> u64 {
        let elapsed_wall_ns = self.clock.now_ns().saturating_sub(self.start_wall_ns);
        (elapsed_wall_ns as f64 * self.speed) as u64
    }
}

fn duration_to_ns(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
