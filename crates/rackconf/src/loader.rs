//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, MirrorConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/rackmirror/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("rackmirror/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("rackmirror.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load config from a TOML file.
pub fn load_from_file(path: &Path) -> Result<MirrorConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

/// Parse config from a TOML string. Missing keys take compiled defaults.
pub(crate) fn parse_toml(contents: &str, path: &Path) -> Result<MirrorConfig, ConfigError> {
    let mut config: MirrorConfig =
        toml::from_str(contents).map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let state_dir = config.infra.paths.state_dir.to_string_lossy().to_string();
    config.infra.paths.state_dir = expand_path(&state_dir);

    Ok(config)
}

/// Keep `overlay` when it differs from the compiled default, otherwise `base`.
fn pick<T: PartialEq>(base: T, overlay: T, default: &T) -> T {
    if overlay != *default {
        overlay
    } else {
        base
    }
}

/// Merge two configs, with `overlay` taking precedence field by field.
///
/// A field only overrides when the overlay file moved it away from the
/// compiled default, so a user file that sets one key keeps the system
/// file's other keys.
pub fn merge_configs(base: MirrorConfig, overlay: MirrorConfig) -> MirrorConfig {
    let d = MirrorConfig::default();
    let (b, o) = (base.infra, overlay.infra);
    let (bs, os) = (base.sync, overlay.sync);

    MirrorConfig {
        infra: crate::InfraConfig {
            paths: crate::PathsConfig {
                state_dir: pick(b.paths.state_dir, o.paths.state_dir, &d.infra.paths.state_dir),
            },
            bind: crate::BindConfig {
                listen_host: pick(b.bind.listen_host, o.bind.listen_host, &d.infra.bind.listen_host),
                listen_port: pick(b.bind.listen_port, o.bind.listen_port, &d.infra.bind.listen_port),
                peer_host: pick(b.bind.peer_host, o.bind.peer_host, &d.infra.bind.peer_host),
                peer_port: pick(b.bind.peer_port, o.bind.peer_port, &d.infra.bind.peer_port),
            },
            telemetry: crate::TelemetryConfig {
                log_level: pick(
                    b.telemetry.log_level,
                    o.telemetry.log_level,
                    &d.infra.telemetry.log_level,
                ),
            },
        },
        sync: crate::SyncConfig {
            retry_limit: pick(bs.retry_limit, os.retry_limit, &d.sync.retry_limit),
            check_interval_ms: pick(
                bs.check_interval_ms,
                os.check_interval_ms,
                &d.sync.check_interval_ms,
            ),
            light_update_interval_ms: pick(
                bs.light_update_interval_ms,
                os.light_update_interval_ms,
                &d.sync.light_update_interval_ms,
            ),
            send_buffer_size: pick(
                bs.send_buffer_size,
                os.send_buffer_size,
                &d.sync.send_buffer_size,
            ),
            library_dump: pick(bs.library_dump, os.library_dump, &d.sync.library_dump),
        },
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut MirrorConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, env::vars());
}

/// Apply overrides from an explicit variable list (the environment in production).
pub fn apply_overrides_from<I>(config: &mut MirrorConfig, sources: &mut ConfigSources, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let applied = match key.as_str() {
            "RACKMIRROR_STATE_DIR" => {
                config.infra.paths.state_dir = expand_path(&value);
                true
            }
            "RACKMIRROR_LISTEN_HOST" => {
                config.infra.bind.listen_host = value;
                true
            }
            "RACKMIRROR_LISTEN_PORT" => set_parsed(&mut config.infra.bind.listen_port, &value),
            "RACKMIRROR_PEER_HOST" => {
                config.infra.bind.peer_host = value;
                true
            }
            "RACKMIRROR_PEER_PORT" => set_parsed(&mut config.infra.bind.peer_port, &value),
            "RACKMIRROR_LOG_LEVEL" | "RUST_LOG" => {
                config.infra.telemetry.log_level = value;
                true
            }
            "RACKMIRROR_RETRY_LIMIT" => set_parsed(&mut config.sync.retry_limit, &value),
            "RACKMIRROR_CHECK_INTERVAL_MS" => {
                set_parsed(&mut config.sync.check_interval_ms, &value)
            }
            _ => false,
        };

        if applied {
            sources.env_overrides.push(key);
        }
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, value: &str) -> bool {
    match value.parse() {
        Ok(parsed) => {
            *slot = parsed;
            true
        }
        Err(_) => false,
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_absolute() {
        assert_eq!(expand_path("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_discover_config_files() {
        let _files = discover_config_files();
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
[bind]
peer_port = 9001
"#;
        let config = parse_toml(toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.infra.bind.peer_port, 9001);
        assert_eq!(config.infra.bind.listen_port, 7000);
        assert_eq!(config.sync.retry_limit, 5);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
[paths]
state_dir = "/data/rackmirror"

[bind]
listen_host = "127.0.0.1"
listen_port = 7100
peer_host = "10.0.0.2"
peer_port = 7101

[telemetry]
log_level = "debug"

[sync]
retry_limit = 9
check_interval_ms = 50
light_update_interval_ms = 33
send_buffer_size = 8192
library_dump = false
"#;
        let config = parse_toml(toml, Path::new("test.toml")).unwrap();

        assert_eq!(config.infra.paths.state_dir, PathBuf::from("/data/rackmirror"));
        assert_eq!(config.infra.bind.listen_addr(), "127.0.0.1:7100");
        assert_eq!(config.infra.bind.peer_addr(), "10.0.0.2:7101");
        assert_eq!(config.infra.telemetry.log_level, "debug");
        assert_eq!(config.sync.retry_limit, 9);
        assert_eq!(config.sync.check_interval_ms, 50);
        assert_eq!(config.sync.light_update_interval_ms, 33);
        assert_eq!(config.sync.send_buffer_size, 8192);
        assert!(!config.sync.library_dump);
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = parse_toml("[bind\nlisten_port = ", Path::new("broken.toml")).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_merge_keeps_base_fields_the_overlay_left_alone() {
        let base = parse_toml("[bind]\npeer_port = 9001\n", Path::new("system.toml")).unwrap();
        let overlay = parse_toml("[sync]\nretry_limit = 2\n", Path::new("user.toml")).unwrap();

        let merged = merge_configs(base, overlay);
        assert_eq!(merged.infra.bind.peer_port, 9001);
        assert_eq!(merged.sync.retry_limit, 2);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = MirrorConfig::default();
        let mut sources = ConfigSources::default();

        apply_overrides_from(
            &mut config,
            &mut sources,
            vars(&[
                ("RACKMIRROR_PEER_PORT", "7301"),
                ("RACKMIRROR_LISTEN_PORT", "not-a-port"),
                ("RACKMIRROR_RETRY_LIMIT", "12"),
                ("RUST_LOG", "rackmirror=trace"),
                ("UNRELATED", "x"),
            ]),
        );

        assert_eq!(config.infra.bind.peer_port, 7301);
        assert_eq!(config.infra.bind.listen_port, 7000);
        assert_eq!(config.sync.retry_limit, 12);
        assert_eq!(config.infra.telemetry.log_level, "rackmirror=trace");
        assert_eq!(
            sources.env_overrides,
            vec!["RACKMIRROR_PEER_PORT", "RACKMIRROR_RETRY_LIMIT", "RUST_LOG"]
        );
    }
}
