//! Infrastructure configuration - things that cannot change at runtime.
//!
//! The peer port is the one exception: the renderer may move it with
//! `/set_unreal_server_port`, but that change lives in the transport, not here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesystem paths for rackmirror state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory for files handed to the renderer (library catalog dump).
    /// Default: ~/.local/share/rackmirror
    #[serde(default = "PathsConfig::default_state_dir")]
    pub state_dir: PathBuf,
}

impl PathsConfig {
    fn default_state_dir() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".local/share/rackmirror"))
            .unwrap_or_else(|| PathBuf::from(".local/share/rackmirror"))
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_dir: Self::default_state_dir(),
        }
    }
}

/// UDP endpoints for the mirror link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindConfig {
    /// Address the inbound listener binds to.
    /// Default: 0.0.0.0
    #[serde(default = "BindConfig::default_listen_host")]
    pub listen_host: String,

    /// Port the inbound listener binds to. 0 picks an ephemeral port.
    /// Default: 7000
    #[serde(default = "BindConfig::default_listen_port")]
    pub listen_port: u16,

    /// Renderer host that receives outbound bundles.
    /// Default: 127.0.0.1
    #[serde(default = "BindConfig::default_peer_host")]
    pub peer_host: String,

    /// Renderer port that receives outbound bundles.
    /// Default: 7001
    #[serde(default = "BindConfig::default_peer_port")]
    pub peer_port: u16,
}

impl BindConfig {
    fn default_listen_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_listen_port() -> u16 {
        7000
    }

    fn default_peer_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_peer_port() -> u16 {
        7001
    }

    /// `host:port` the listener binds to
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }

    /// `host:port` of the renderer
    pub fn peer_addr(&self) -> String {
        format!("{}:{}", self.peer_host, self.peer_port)
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            listen_host: Self::default_listen_host(),
            listen_port: Self::default_listen_port(),
            peer_host: Self::default_peer_host(),
            peer_port: Self::default_peer_port(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter (trace, debug, info, warn, error, or a full EnvFilter directive).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

/// Infrastructure configuration - cannot change at runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfraConfig {
    /// Filesystem paths.
    #[serde(default)]
    pub paths: PathsConfig,

    /// UDP endpoints.
    #[serde(default)]
    pub bind: BindConfig,

    /// Logging settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
