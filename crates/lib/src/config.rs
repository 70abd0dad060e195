//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.duet/config.json`) and environment.
//! The registry itself takes no configuration; these settings cover the listener,
//! the ICE servers handed to clients, and the routing policy.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Listener settings for HTTP and WebSocket.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Connectivity-assistance servers passed through to clients.
    #[serde(default)]
    pub ice: IceConfig,

    /// Routing policy.
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP and WebSocket (default 8080). Overridden by DUET_PORT env.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

/// STUN/TURN server URLs. Clients use them when building their peer connection;
/// the relay never contacts them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceConfig {
    #[serde(default = "default_ice_servers")]
    pub servers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// When true (default), a signal is only forwarded if sender and target share a session.
    #[serde(default = "default_require_co_membership")]
    pub require_co_membership: bool,
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_ice_servers() -> Vec<String> {
    vec!["stun:stun.l.google.com:19302".to_string()]
}

fn default_require_co_membership() -> bool {
    true
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            servers: default_ice_servers(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            require_co_membership: default_require_co_membership(),
        }
    }
}

/// Resolve the listener port: env DUET_PORT overrides config. Unparseable values are ignored.
pub fn resolve_port(config: &Config) -> u16 {
    std::env::var("DUET_PORT")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            match t.parse::<u16>() {
                Ok(p) => Some(p),
                Err(_) => {
                    log::warn!("ignoring invalid DUET_PORT value: {:?}", t);
                    None
                }
            }
        })
        .unwrap_or(config.gateway.port)
}

/// Resolve ICE servers: env DUET_ICE_SERVERS (comma separated) overrides config.
pub fn resolve_ice_servers(config: &Config) -> Vec<String> {
    std::env::var("DUET_ICE_SERVERS")
        .ok()
        .map(|s| parse_server_list(&s))
        .filter(|list| !list.is_empty())
        .unwrap_or_else(|| config.ice.servers.clone())
}

fn parse_server_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Apply environment overrides in place (port, ICE servers).
pub fn apply_env_overrides(config: &mut Config) {
    config.gateway.port = resolve_port(config);
    config.ice.servers = resolve_ice_servers(config);
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("DUET_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".duet").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path, or the default path (or DUET_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gateway_port_and_bind() {
        let g = GatewayConfig::default();
        assert_eq!(g.port, 8080);
        assert_eq!(g.bind, "0.0.0.0");
    }

    #[test]
    fn empty_object_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.ice.servers, vec!["stun:stun.l.google.com:19302"]);
        assert!(config.relay.require_co_membership);
    }

    #[test]
    fn camel_case_fields_parse() {
        let config: Config = serde_json::from_str(
            r#"{
                "gateway": { "port": 9000, "bind": "127.0.0.1" },
                "ice": { "servers": ["stun:a.example:3478", "turn:b.example:3478"] },
                "relay": { "requireCoMembership": false }
            }"#,
        )
        .unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.bind, "127.0.0.1");
        assert_eq!(config.ice.servers.len(), 2);
        assert!(!config.relay.require_co_membership);
    }

    #[test]
    fn server_list_trims_and_skips_blanks() {
        assert_eq!(
            parse_server_list(" stun:a:1 , ,turn:b:2,"),
            vec!["stun:a:1".to_string(), "turn:b:2".to_string()]
        );
        assert!(parse_server_list(" , ").is_empty());
    }

    // Only test touching DUET_PORT / DUET_ICE_SERVERS; set and cleared here so nothing races it.
    #[test]
    fn env_overrides_apply_and_bad_values_fall_back() {
        let mut config = Config::default();
        config.gateway.port = 7000;
        config.ice.servers = vec!["stun:file.example:3478".to_string()];

        std::env::set_var("DUET_PORT", "9100");
        assert_eq!(resolve_port(&config), 9100);
        std::env::set_var("DUET_PORT", "nope");
        assert_eq!(resolve_port(&config), 7000);
        std::env::set_var("DUET_PORT", "70000");
        assert_eq!(resolve_port(&config), 7000);
        std::env::remove_var("DUET_PORT");
        assert_eq!(resolve_port(&config), 7000);

        std::env::set_var("DUET_ICE_SERVERS", "stun:a.example:3478, turn:b.example:3478");
        assert_eq!(
            resolve_ice_servers(&config),
            vec!["stun:a.example:3478", "turn:b.example:3478"]
        );
        std::env::set_var("DUET_ICE_SERVERS", " , ");
        assert_eq!(resolve_ice_servers(&config), vec!["stun:file.example:3478"]);
        std::env::remove_var("DUET_ICE_SERVERS");
        assert_eq!(resolve_ice_servers(&config), vec!["stun:file.example:3478"]);

        std::env::set_var("DUET_PORT", " 9200 ");
        std::env::set_var("DUET_ICE_SERVERS", "stun:c.example:3478");
        apply_env_overrides(&mut config);
        std::env::remove_var("DUET_PORT");
        std::env::remove_var("DUET_ICE_SERVERS");
        assert_eq!(config.gateway.port, 9200);
        assert_eq!(config.ice.servers, vec!["stun:c.example:3478"]);
    }

    #[test]
    fn load_config_missing_file_uses_defaults() {
        let path = std::env::temp_dir()
            .join(format!("duet-missing-{}", uuid::Uuid::new_v4()))
            .join("config.json");
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(config.gateway.port, 8080);
    }

    #[test]
    fn load_config_rejects_malformed_json() {
        let dir = std::env::temp_dir().join(format!("duet-config-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let err = load_config(Some(path)).unwrap_err();
        assert!(err.to_string().contains("parsing config"));
    }
}
