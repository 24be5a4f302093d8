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

// Error types for the playback engine

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while opening, seeking or streaming a recording
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to open recording '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("recording '{0}' has no summary section")]
    MissingSummary(PathBuf),

    #[error("recording '{0}' has no statistics record")]
    MissingStatistics(PathBuf),

    #[error("message references unknown channel {0}")]
    UnknownChannel(u16),

    #[error("recording '{0}' has messages outside indexed chunks")]
    Unindexed(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MCAP error: {0}")]
    Mcap(#[from] mcap::McapError),

    #[error("playback task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
