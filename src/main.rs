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

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use mcap_playback::config::{load_config_with_env, ConfigLoader, LoggingConfig};
use mcap_playback::{
    Capability, McapPlayer, MonotonicClock, PlaybackListener, PlaybackLoop, PlaybackSink,
    PlaybackSource, PlayerOptions, ServerInfo, WebSocketServer,
};

/// MCAP Playback - Serve an MCAP recording to WebSocket viewers with ranged playback
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// MCAP file to play back
    #[arg(short, long)]
    file: PathBuf,

    /// Host to bind (overrides config file and PLAYBACK_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config file and PLAYBACK_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.to_lowercase()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if logging.format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config_with_env(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    ConfigLoader::validate(&config)?;

    init_tracing(&config.logging)?;

    info!("Starting MCAP playback server");
    if let Some(path) = &args.config {
        info!("Loaded configuration from: {:?}", path);
    }

    let options = PlayerOptions {
        clock: Arc::new(MonotonicClock::new()),
        initial_speed: config.playback.initial_speed,
        notify_interval: config.playback.notify_interval(),
    };
    let mut player = McapPlayer::open_with(&args.file, options)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;
    if config.playback.autoplay {
        player.play();
    }

    let (data_start_time, data_end_time) = player.time_range();
    let info = ServerInfo {
        name: config
            .server
            .name
            .clone()
            .unwrap_or_else(|| display_name(&args.file)),
        capabilities: vec![Capability::RangedPlayback, Capability::Time],
        data_start_time,
        data_end_time,
        session_id: Uuid::new_v4().to_string(),
    };

    let player = Arc::new(Mutex::new(player));
    let listener = Arc::new(PlaybackListener::new(player.clone()));
    let server = WebSocketServer::start(config.server.settings(), info, listener).await?;

    let sink: Arc<dyn PlaybackSink> = Arc::new(server.clone());
    sink.broadcast_playback_state(&player.lock().await.snapshot(false, None));

    let playback = PlaybackLoop::new(player, sink, config.playback.loop_settings());

    let outcome = tokio::select! {
        result = playback.run() => {
            if let Err(e) = &result {
                error!("Playback stopped: {}", e);
            }
            result.map_err(anyhow::Error::from)
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    };

    server.stop();
    info!("MCAP playback server shut down");
    outcome
}
