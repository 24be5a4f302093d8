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

// Configuration system integration tests

use mcap_playback::config::{load_config, load_config_with_env, PlaybackConfig};
use std::fs;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let temp = NamedTempFile::new().expect("Failed to create temp config");
    fs::write(temp.path(), content).expect("Failed to write temp config");
    temp
}

#[test]
fn test_load_default_config() {
    let config_path = PathBuf::from("config/default.yaml");

    if config_path.exists() {
        std::env::remove_var("PLAYBACK_HOST");
        std::env::remove_var("PLAYBACK_PORT");

        let result = load_config(&config_path);
        assert!(result.is_ok(), "Failed to load default config: {:?}", result.err());

        let config = result.unwrap();
        assert_eq!(config, PlaybackConfig::default());
    }
}

#[test]
fn test_config_with_env_vars() {
    let temp = write_config(
        r#"
server:
  host: ${MCAP_TEST_BIND_HOST:-127.0.0.1}
  port: ${MCAP_TEST_BIND_PORT:-9100}
  name: ${MCAP_TEST_NAME:-bench-run}

playback:
  initial_speed: 2.5
  autoplay: true

logging:
  level: debug
  format: json
"#,
    );

    std::env::set_var("MCAP_TEST_BIND_HOST", "0.0.0.0");
    std::env::remove_var("MCAP_TEST_BIND_PORT");
    std::env::remove_var("MCAP_TEST_NAME");

    let result = load_config(temp.path());
    assert!(result.is_ok(), "Failed to load config with env vars: {:?}", result.err());
    let config = result.unwrap();

    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9100);
    assert_eq!(config.server.name.as_deref(), Some("bench-run"));
    assert_eq!(config.playback.initial_speed, 2.5);
    assert!(config.playback.autoplay);
    assert_eq!(config.playback.max_sleep_ms, 1000);
    assert_eq!(config.logging.format, "json");

    std::env::remove_var("MCAP_TEST_BIND_HOST");
}

#[test]
fn test_invalid_config_is_rejected() {
    let temp = write_config(
        r#"
playback:
  idle_poll_interval_ms: 0
"#,
    );

    let err = load_config(temp.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("idle_poll_interval_ms"));
}

#[test]
fn test_malformed_yaml_is_rejected() {
    let temp = write_config("server: [unterminated");
    assert!(load_config(temp.path()).is_err());
}

#[test]
fn test_missing_file_is_rejected() {
    assert!(load_config("/nonexistent/playback.yaml").is_err());
}

#[test]
fn test_no_file_uses_defaults() {
    std::env::remove_var("PLAYBACK_HOST");
    std::env::remove_var("PLAYBACK_PORT");

    let config = load_config_with_env(None).unwrap();
    assert_eq!(config, PlaybackConfig::default());
}
