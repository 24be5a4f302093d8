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

// Configuration loader with environment variable substitution

use super::types::*;
use anyhow::{bail, Context, Result};
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::OnceLock;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["text", "json"];
/// Longest a pacing sleep may hold off a control request
const MAX_SLEEP_LIMIT_MS: u64 = 1000;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<PlaybackConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration text, substituting environment variables first
    pub fn parse(content: &str) -> Result<PlaybackConfig> {
        let content = Self::substitute_env_vars(content);

        let config: PlaybackConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${HOME} -> /home/user
    /// - ${PLAYBACK_PORT:-8765} -> 8765 (if PLAYBACK_PORT not set)
    ///
    /// Unset variables without a default are left untouched.
    pub fn substitute_env_vars(content: &str) -> String {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("env var pattern is valid")
        });

        re.replace_all(content, |caps: &Captures| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => match caps.get(2) {
                    Some(default) => default.as_str().to_string(),
                    None => caps[0].to_string(),
                },
            }
        })
        .into_owned()
    }

    /// Validate configuration
    pub fn validate(config: &PlaybackConfig) -> Result<()> {
        if config.server.host.trim().is_empty() {
            bail!("server.host cannot be empty");
        }

        if config.server.port == 0 {
            bail!("server.port must be > 0");
        }

        if config.server.event_queue_capacity == 0 {
            bail!("server.event_queue_capacity must be > 0");
        }

        let speed = config.playback.initial_speed;
        if !speed.is_finite() || speed <= 0.0 {
            bail!("playback.initial_speed must be a positive number, got {}", speed);
        }

        if config.playback.idle_poll_interval_ms == 0 {
            bail!("playback.idle_poll_interval_ms must be > 0");
        }

        let max_sleep_ms = config.playback.max_sleep_ms;
        if max_sleep_ms == 0 || max_sleep_ms > MAX_SLEEP_LIMIT_MS {
            bail!(
                "playback.max_sleep_ms must be between 1 and {}, got {}",
                MAX_SLEEP_LIMIT_MS,
                max_sleep_ms
            );
        }

        if config.playback.time_notify_hz == 0 {
            bail!("playback.time_notify_hz must be > 0");
        }

        let level = config.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            bail!(
                "Unknown logging.level: '{}'. Supported: {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            );
        }

        let format = config.logging.format.to_lowercase();
        if !LOG_FORMATS.contains(&format.as_str()) {
            bail!(
                "Unknown logging.format: '{}'. Supported: {}",
                config.logging.format,
                LOG_FORMATS.join(", ")
            );
        }

        Ok(())
    }
}
