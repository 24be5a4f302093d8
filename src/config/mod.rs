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

// Configuration module for mcap-playback
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Configuration validation
// - Default values

mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PlaybackConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
///
/// Without a file, defaults are used. `PLAYBACK_HOST` and `PLAYBACK_PORT`
/// override the server address.
pub fn load_config_with_env(path: Option<&Path>) -> Result<PlaybackConfig> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => PlaybackConfig::default(),
    };

    if let Ok(host) = std::env::var("PLAYBACK_HOST") {
        config.server.host = host;
    }

    if let Ok(port) = std::env::var("PLAYBACK_PORT") {
        config.server.port = port
            .parse()
            .with_context(|| format!("Invalid PLAYBACK_PORT '{}'", port))?;
    }

    ConfigLoader::validate(&config)?;
    Ok(config)
}
