//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." (every developer at 3am) 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! ```toml
//! [connection]
//! host = "127.0.0.1"
//! port = 1491
//! password = "SecretPassword"
//!
//! [runtime]
//! parallelism = 8
//! ```
//!
//! Env vars work too: `SONX_CONNECTION__PASSWORD=...`, `SONX_RUNTIME__PARALLELISM=8`.

use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::TcpConnectorConfig;

/// 📦 Everything the app needs to know about itself.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// 📡 Where the ingest channel lives.
    #[serde(default)]
    pub connection: TcpConnectorConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// 🧵 Knobs for the bulk fan-out.
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// 🧵 Requested workers per bulk call. Clamped to `[1, records]` at call time.
    #[serde(default = "default_parallelism", alias = "parallel_routines")]
    pub parallelism: i64,
    /// 📊 Draw a progress bar during bulk calls.
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

fn default_parallelism() -> i64 {
    4
}

fn default_show_progress() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            show_progress: default_show_progress(),
        }
    }
}

/// 🚀 Load the config from `SONX_*` env vars, plus a TOML file when one is given.
///
/// 📐 No file means env vars only. A file is merged over the env, and the file wins.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("SONX_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (SONX_*). \
             The file exists in our hearts, but apparently not in a shape serde likes.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (SONX_*). \
                 No file was provided, so this one's all on the environment."
            .to_string(),
    };

    config.extract().context(context_msg)
}
