//! Minimal configuration loading for rackmirror.
//!
//! # Configuration Philosophy
//!
//! - **Infrastructure** (`InfraConfig`): things fixed for the life of the
//!   process - state paths, UDP endpoints, log filter.
//!
//! - **Sync** (`SyncConfig`): tunables for the sync engine - retry budget,
//!   poll intervals, datagram size.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rackconf::MirrorConfig;
//!
//! let config = MirrorConfig::load().expect("Failed to load config");
//! println!("listening on {}", config.infra.bind.listen_addr());
//! println!("mirroring to {}", config.infra.bind.peer_addr());
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/rackmirror/config.toml` (system)
//! 2. `~/.config/rackmirror/config.toml` (user)
//! 3. `./rackmirror.toml` (local override, or the path given on the CLI)
//! 4. Environment variables (`RACKMIRROR_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! state_dir = "~/.local/share/rackmirror"
//!
//! [bind]
//! listen_port = 7000
//! peer_host = "127.0.0.1"
//! peer_port = 7001
//!
//! [telemetry]
//! log_level = "info"
//!
//! [sync]
//! retry_limit = 5
//! check_interval_ms = 200
//! ```

pub mod infra;
pub mod loader;
pub mod sync;

pub use infra::{BindConfig, InfraConfig, PathsConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sync::SyncConfig;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete rackmirror configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MirrorConfig {
    /// Infrastructure - fixed at startup.
    #[serde(flatten)]
    pub infra: InfraConfig,

    /// Sync engine tunables.
    #[serde(default)]
    pub sync: SyncConfig,
}

impl MirrorConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with an optional CLI path, then apply env overrides.
    pub fn load_from(config_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = MirrorConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let file_config = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, file_config);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# rackmirror configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!(
            "state_dir = \"{}\"\n",
            self.infra.paths.state_dir.display()
        ));

        output.push_str("\n[bind]\n");
        output.push_str(&format!("listen_host = \"{}\"\n", self.infra.bind.listen_host));
        output.push_str(&format!("listen_port = {}\n", self.infra.bind.listen_port));
        output.push_str(&format!("peer_host = \"{}\"\n", self.infra.bind.peer_host));
        output.push_str(&format!("peer_port = {}\n", self.infra.bind.peer_port));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!(
            "log_level = \"{}\"\n",
            self.infra.telemetry.log_level
        ));

        output.push_str("\n[sync]\n");
        output.push_str(&format!("retry_limit = {}\n", self.sync.retry_limit));
        output.push_str(&format!(
            "check_interval_ms = {}\n",
            self.sync.check_interval_ms
        ));
        output.push_str(&format!(
            "light_update_interval_ms = {}\n",
            self.sync.light_update_interval_ms
        ));
        output.push_str(&format!(
            "send_buffer_size = {}\n",
            self.sync.send_buffer_size
        ));
        output.push_str(&format!("library_dump = {}\n", self.sync.library_dump));

        output
    }
}
