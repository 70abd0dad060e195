use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser)]
#[command(name = "duet")]
#[command(about = "Duet signaling relay for two-party calls", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: DUET_CONFIG_PATH or ~/.duet/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the relay (HTTP + WebSocket on one port).
    Serve {
        /// Config file path (default: DUET_CONFIG_PATH or ~/.duet/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// WebSocket and HTTP port (default from DUET_PORT, config, or 8080)
        #[arg(long, short)]
        port: Option<u16>,

        /// Bind address (default from config or 0.0.0.0)
        #[arg(long, short, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Join a session on a running relay and print every event received (diagnostics).
    Join {
        /// Session id to join.
        session: String,

        /// Config file path, used to derive the relay URL when --url is absent.
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// WebSocket URL of the relay (default ws://127.0.0.1:<port>/ws).
        #[arg(long, value_name = "URL")]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("duet {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port, bind }) => {
            if let Err(e) = run_serve(config, port, bind).await {
                log::error!("relay failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Join {
            session,
            config,
            url,
        }) => {
            if let Err(e) = run_join(config, url, session).await {
                eprintln!("join error: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(duet::config::default_config_path);
    let dir = duet::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
    bind: Option<String>,
) -> anyhow::Result<()> {
    let (mut config, path) = duet::config::load_config(config_path)?;
    log::debug!("using config {}", path.display());
    duet::config::apply_env_overrides(&mut config);
    if let Some(p) = port {
        config.gateway.port = p;
    }
    if let Some(b) = bind {
        config.gateway.bind = b;
    }
    log::info!("starting relay on {}:{}", config.gateway.bind, config.gateway.port);
    duet::gateway::run_gateway(config).await
}

/// Relay URL from config: wildcard binds are reached via loopback, IPv6 literals are bracketed.
fn default_ws_url(config: &duet::config::Config) -> String {
    let bind = config.gateway.bind.trim();
    let host = if bind.is_empty() || bind == "0.0.0.0" || bind == "::" {
        "127.0.0.1".to_string()
    } else if bind.parse::<std::net::Ipv6Addr>().is_ok() {
        format!("[{}]", bind)
    } else {
        bind.to_string()
    };
    format!("ws://{}:{}/ws", host, config.gateway.port)
}

async fn run_join(
    config_path: Option<std::path::PathBuf>,
    url: Option<String>,
    session: String,
) -> anyhow::Result<()> {
    let ws_url = match url {
        Some(u) => u,
        None => {
            let (mut config, _) = duet::config::load_config(config_path)?;
            duet::config::apply_env_overrides(&mut config);
            default_ws_url(&config)
        }
    };

    let (mut ws, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .map_err(|e| anyhow::anyhow!("connecting to {}: {}", ws_url, e))?;

    let join = serde_json::json!({ "event": "join-session", "data": session });
    ws.send(Message::Text(join.to_string())).await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                let _ = ws.close(None).await;
                break;
            }
            msg = ws.next() => {
                let Some(msg) = msg else { break };
                let Message::Text(text) = msg? else { continue };
                let event: serde_json::Value = serde_json::from_str(&text)?;
                let name = event.get("event").and_then(|v| v.as_str()).unwrap_or("?");
                match event.get("data") {
                    Some(data) => println!("< {} {}", name, data),
                    None => println!("< {}", name),
                }
                if name == "session-full" || name == "shutdown" {
                    break;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_bind_maps_to_loopback() {
        let config = duet::config::Config::default();
        assert_eq!(default_ws_url(&config), "ws://127.0.0.1:8080/ws");
    }

    #[test]
    fn explicit_bind_is_kept() {
        let mut config = duet::config::Config::default();
        config.gateway.bind = "10.0.0.5".to_string();
        config.gateway.port = 9000;
        assert_eq!(default_ws_url(&config), "ws://10.0.0.5:9000/ws");
    }

    #[test]
    fn ipv6_bind_is_bracketed() {
        let mut config = duet::config::Config::default();
        config.gateway.bind = "::1".to_string();
        assert_eq!(default_ws_url(&config), "ws://[::1]:8080/ws");

        config.gateway.bind = "[::1]".to_string();
        assert_eq!(default_ws_url(&config), "ws://[::1]:8080/ws");

        config.gateway.bind = "relay.local".to_string();
        assert_eq!(default_ws_url(&config), "ws://relay.local:8080/ws");
    }
}
