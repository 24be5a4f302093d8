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

// Shared fixtures for integration tests

#![allow(dead_code)]

use mcap::records::MessageHeader;
use mcap_playback::{ChannelDescriptor, ChannelId, PlaybackSink, PlaybackState};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use tempfile::NamedTempFile;

pub const MS: u64 = 1_000_000;

/// Write an MCAP file with one JSON channel per distinct topic
pub fn write_recording_to(path: &Path, messages: &[(&str, u64, &[u8])]) {
    let file = File::create(path).expect("Failed to create recording");
    let mut writer = mcap::Writer::new(BufWriter::new(file)).expect("Failed to start writer");
    let schema_id = writer
        .add_schema("Sample", "jsonschema", br#"{"type":"object"}"#)
        .expect("Failed to add schema");

    let mut channel_ids: HashMap<String, u16> = HashMap::new();
    for (index, (topic, log_time, data)) in messages.iter().enumerate() {
        let channel_id = match channel_ids.get(*topic) {
            Some(id) => *id,
            None => {
                let id = writer
                    .add_channel(schema_id, topic, "json", &BTreeMap::new())
                    .expect("Failed to add channel");
                channel_ids.insert(topic.to_string(), id);
                id
            }
        };
        writer
            .write_to_known_channel(
                &MessageHeader {
                    channel_id,
                    sequence: index as u32,
                    log_time: *log_time,
                    publish_time: *log_time,
                },
                data,
            )
            .expect("Failed to write message");
    }
    writer.finish().expect("Failed to finish recording");
}

pub fn write_recording(messages: &[(&str, u64, &[u8])]) -> NamedTempFile {
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    write_recording_to(temp.path(), messages);
    temp
}

/// Three messages on `/a` at 0, 100 and 500 ms
pub fn three_message_recording() -> NamedTempFile {
    write_recording(&[
        ("/a", 0, b"{\"n\":0}"),
        ("/a", 100 * MS, b"{\"n\":1}"),
        ("/a", 500 * MS, b"{\"n\":2}"),
    ])
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Time(u64),
    State(PlaybackState),
    Channel(ChannelId, ChannelDescriptor),
    Message {
        channel: ChannelId,
        payload: Vec<u8>,
        log_time: u64,
    },
}

/// Sink that records every call in order
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
    channels: Mutex<HashMap<String, ChannelId>>,
    next_id: AtomicU32,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Log times of every message logged so far
    pub fn message_times(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Message { log_time, .. } => Some(log_time),
                _ => None,
            })
            .collect()
    }

    pub fn states(&self) -> Vec<PlaybackState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::State(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn channel_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, SinkEvent::Channel(..)))
            .count()
    }

    pub fn times(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Time(time) => Some(time),
                _ => None,
            })
            .collect()
    }
}

impl PlaybackSink for RecordingSink {
    fn broadcast_time(&self, timestamp_ns: u64) {
        self.events.lock().unwrap().push(SinkEvent::Time(timestamp_ns));
    }

    fn broadcast_playback_state(&self, state: &PlaybackState) {
        self.events
            .lock()
            .unwrap()
            .push(SinkEvent::State(state.clone()));
    }

    fn add_channel(&self, descriptor: &ChannelDescriptor) -> ChannelId {
        let mut channels = self.channels.lock().unwrap();
        if let Some(id) = channels.get(&descriptor.topic) {
            return *id;
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        channels.insert(descriptor.topic.clone(), id);
        self.events
            .lock()
            .unwrap()
            .push(SinkEvent::Channel(id, descriptor.clone()));
        id
    }

    fn log(&self, channel: ChannelId, payload: &[u8], log_time_ns: u64) {
        self.events.lock().unwrap().push(SinkEvent::Message {
            channel,
            payload: payload.to_vec(),
            log_time: log_time_ns,
        });
    }
}
