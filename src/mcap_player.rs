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

//! MCAP-backed playback source
//!
//! The player reads the summary section once to learn the recording's time
//! range and chunk index, then streams messages through a forward-only
//! cursor. Seeking re-opens the cursor at the target time using the chunk
//! index, so only chunks that can hold messages at or after the target are
//! read. Each call to `log_next_message` either emits one due message or
//! hands back the wall-clock delay until the next one, keeping that message
//! in a one-record lookahead so nothing is lost if a control request arrives
//! while the caller sleeps.
//!
//! # Thread Safety
//!
//! `McapPlayer` is `Send` but not shared: wrap it in a mutex and hand the
//! same mutex to the control listener and the pacing loop. Reading the next
//! message may load a chunk from disk, so callers on an async runtime should
//! drive `log_next_message` from a blocking task.

use bytes::Bytes;
use mcap::sans_io::indexed_reader::{
    IndexedReadEvent, IndexedReader, IndexedReaderOptions, ReadOrder,
};
use mcap::sans_io::summary_reader::{SummaryReadEvent, SummaryReader};
use mcap::Summary;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::clock::{Clock, MonotonicClock};
use crate::error::{PlaybackError, Result};
use crate::protocol::PlaybackStatus;
use crate::sink::{ChannelDescriptor, ChannelId, PlaybackSink, SchemaDescriptor};
use crate::source::{clamp_speed, PlaybackSource};
use crate::time_tracker::{TimeTracker, DEFAULT_NOTIFY_INTERVAL};

/// Tuning knobs for a player
#[derive(Debug, Clone)]
pub struct PlayerOptions {
    /// Wall-clock source used for pacing
    pub clock: Arc<dyn Clock>,
    /// Speed in effect before the first control request
    pub initial_speed: f64,
    /// Minimum spacing between time broadcasts, in log time
    pub notify_interval: Duration,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            clock: Arc::new(MonotonicClock::new()),
            initial_speed: 1.0,
            notify_interval: DEFAULT_NOTIFY_INTERVAL,
        }
    }
}

/// One message read from the recording
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub channel: Arc<ChannelDescriptor>,
    pub log_time: u64,
    pub data: Bytes,
}

/// Channel descriptors from the summary, keyed by MCAP channel id
type ChannelTable = HashMap<u16, Arc<ChannelDescriptor>>;

fn channel_table(summary: &Summary) -> ChannelTable {
    summary
        .channels
        .iter()
        .map(|(id, channel)| {
            let schema = channel.schema.as_ref().map(|schema| SchemaDescriptor {
                name: schema.name.clone(),
                encoding: schema.encoding.clone(),
                data: Bytes::copy_from_slice(&schema.data),
            });
            let descriptor = ChannelDescriptor {
                topic: channel.topic.clone(),
                message_encoding: channel.message_encoding.clone(),
                schema,
            };
            (*id, Arc::new(descriptor))
        })
        .collect()
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| PlaybackError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Read the summary section from the end of the file
///
/// Only the footer and summary records are read, not the data section.
fn read_summary(path: &Path) -> Result<Option<Summary>> {
    let mut file = open_file(path)?;
    let mut reader = SummaryReader::new();
    while let Some(event) = reader.next_event() {
        match event? {
            SummaryReadEvent::ReadRequest(count) => {
                let read = file.read(reader.insert(count))?;
                reader.notify_read(read);
            }
            SummaryReadEvent::SeekRequest(to) => {
                reader.notify_seeked(file.seek(to)?);
            }
        }
    }
    Ok(reader.finish())
}

/// Forward-only message cursor over an MCAP file
///
/// Chunks are visited in file order, skipping those whose messages all
/// precede the start time. Messages are yielded in the order they are
/// stored.
struct McapCursor {
    file: File,
    reader: IndexedReader,
    channels: Arc<ChannelTable>,
    chunk: Vec<u8>,
    chunks_loaded: usize,
}

impl McapCursor {
    fn open(path: &Path, summary: &Summary, channels: Arc<ChannelTable>, start_ns: u64) -> Result<Self> {
        let file = open_file(path)?;
        let options = IndexedReaderOptions::new()
            .with_order(ReadOrder::File)
            .log_time_on_or_after(start_ns);
        let reader = IndexedReader::new_with_options(summary, options)?;

        Ok(Self {
            file,
            reader,
            channels,
            chunk: Vec::new(),
            chunks_loaded: 0,
        })
    }

    fn next_record(&mut self) -> Result<Option<LogRecord>> {
        while let Some(event) = self.reader.next_event() {
            match event? {
                IndexedReadEvent::ReadChunkRequest { offset, length } => {
                    self.file.seek(SeekFrom::Start(offset))?;
                    self.chunk.resize(length, 0);
                    self.file.read_exact(&mut self.chunk)?;
                    self.reader.insert_chunk_record_data(offset, &self.chunk)?;
                    self.chunks_loaded += 1;
                    debug!(
                        "Loaded chunk at offset {} ({} bytes, {} this cursor)",
                        offset, length, self.chunks_loaded
                    );
                }
                IndexedReadEvent::Message { header, data } => {
                    let channel = self
                        .channels
                        .get(&header.channel_id)
                        .cloned()
                        .ok_or(PlaybackError::UnknownChannel(header.channel_id))?;
                    return Ok(Some(LogRecord {
                        channel,
                        log_time: header.log_time,
                        data: Bytes::copy_from_slice(data),
                    }));
                }
            }
        }
        Ok(None)
    }
}

/// Plays back an MCAP file with pacing, pause/resume, seek and speed control
pub struct McapPlayer {
    path: PathBuf,
    options: PlayerOptions,
    summary: Summary,
    time_range: (u64, u64),
    current_time: u64,
    status: PlaybackStatus,
    playback_speed: f64,
    cursor: McapCursor,
    pending: Option<LogRecord>,
    time_tracker: Option<TimeTracker>,
    channels: HashMap<String, ChannelId>,
}

impl fmt::Debug for McapPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McapPlayer")
            .field("path", &self.path)
            .field("time_range", &self.time_range)
            .field("current_time", &self.current_time)
            .field("status", &self.status)
            .field("playback_speed", &self.playback_speed)
            .field("pending", &self.pending.is_some())
            .finish()
    }
}

impl McapPlayer {
    /// Open a recording with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, PlayerOptions::default())
    }

    /// Open a recording, reading its summary statistics for the time range
    ///
    /// Fails if the file cannot be read, has no summary/statistics, or holds
    /// messages outside of indexed chunks.
    pub fn open_with<P: AsRef<Path>>(path: P, options: PlayerOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let summary =
            read_summary(&path)?.ok_or_else(|| PlaybackError::MissingSummary(path.clone()))?;
        let stats = summary
            .stats
            .as_ref()
            .ok_or_else(|| PlaybackError::MissingStatistics(path.clone()))?;
        if stats.message_count > 0 && summary.chunk_indexes.is_empty() {
            return Err(PlaybackError::Unindexed(path));
        }
        let time_range = (stats.message_start_time, stats.message_end_time);

        info!(
            "Opened '{}': {} messages on {} channels in {} chunks, log time {}..{}",
            path.display(),
            stats.message_count,
            stats.channel_count,
            summary.chunk_indexes.len(),
            time_range.0,
            time_range.1
        );

        let channels = Arc::new(channel_table(&summary));
        let cursor = McapCursor::open(&path, &summary, channels, time_range.0)?;
        let playback_speed = clamp_speed(options.initial_speed);

        Ok(Self {
            path,
            options,
            summary,
            time_range,
            current_time: time_range.0,
            status: PlaybackStatus::Paused,
            playback_speed,
            cursor,
            pending: None,
            time_tracker: None,
            channels: HashMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve the output channel for a topic, creating it on first use
    fn channel_for(&mut self, descriptor: &ChannelDescriptor, sink: &dyn PlaybackSink) -> ChannelId {
        if let Some(&id) = self.channels.get(&descriptor.topic) {
            return id;
        }
        let id = sink.add_channel(descriptor);
        debug!("Created channel {} for topic '{}'", id, descriptor.topic);
        self.channels.insert(descriptor.topic.clone(), id);
        id
    }
}

impl PlaybackSource for McapPlayer {
    fn time_range(&self) -> (u64, u64) {
        self.time_range
    }

    fn play(&mut self) {
        // Restarting after the end requires a seek first.
        if self.status == PlaybackStatus::Ended {
            return;
        }
        if let Some(tracker) = self.time_tracker.as_mut() {
            tracker.resume();
        }
        self.status = PlaybackStatus::Playing;
    }

    fn pause(&mut self) {
        if self.status == PlaybackStatus::Ended {
            return;
        }
        if let Some(tracker) = self.time_tracker.as_mut() {
            tracker.pause();
        }
        self.status = PlaybackStatus::Paused;
    }

    fn seek(&mut self, log_time: u64) -> Result<()> {
        let (start, end) = self.time_range;
        let target = log_time.max(start).min(end);

        let channels = self.cursor.channels.clone();
        self.cursor = McapCursor::open(&self.path, &self.summary, channels, target)?;
        self.current_time = target;
        self.pending = None;
        self.time_tracker = None;
        if self.status == PlaybackStatus::Ended {
            self.status = PlaybackStatus::Paused;
        }

        debug!("Seeked to {} (requested {})", target, log_time);
        Ok(())
    }

    fn set_playback_speed(&mut self, speed: f64) {
        let speed = clamp_speed(speed);
        if let Some(tracker) = self.time_tracker.as_mut() {
            tracker.set_speed(speed);
        }
        self.playback_speed = speed;
    }

    fn status(&self) -> PlaybackStatus {
        self.status
    }

    fn current_time(&self) -> u64 {
        self.current_time
    }

    fn playback_speed(&self) -> f64 {
        self.playback_speed
    }

    fn log_next_message(&mut self, sink: &dyn PlaybackSink) -> Result<Option<Duration>> {
        if self.status != PlaybackStatus::Playing {
            return Ok(None);
        }

        let record = match self.pending.take() {
            Some(record) => record,
            None => match self.cursor.next_record()? {
                Some(record) => record,
                None => {
                    self.status = PlaybackStatus::Ended;
                    self.current_time = self.time_range.1;
                    info!("Playback reached the end of '{}'", self.path.display());
                    return Ok(None);
                }
            },
        };

        let tracker = self.time_tracker.get_or_insert_with(|| {
            TimeTracker::new(record.log_time, self.playback_speed, self.options.clock.clone())
                .with_notify_interval(self.options.notify_interval)
        });

        if let Some(delay) = tracker.seconds_until(record.log_time) {
            if !delay.is_zero() {
                self.pending = Some(record);
                return Ok(Some(delay));
            }
        }

        self.current_time = record.log_time;
        if let Some(timestamp) = tracker.notify(record.log_time) {
            sink.broadcast_time(timestamp);
        }

        let channel = self.channel_for(&record.channel, sink);
        sink.log(channel, &record.data, record.log_time);
        Ok(None)
    }
}
