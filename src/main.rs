// SNTP relay server.
//
// Reads `ntpserver.conf` (or the path given as the first argument), serves
// time on the configured listen address, and follows the configured
// upstream if there is one.
//
// Usage:
//   ntp-relay [path/to/ntpserver.conf]
//
// Logging is controlled with RUST_LOG (default: info).

use std::io;

use log::{info, warn};
use ntp_server::server::NtpServerBuilder;
use ntp_server::server_common::RelayConfig;

const DEFAULT_CONFIG_PATH: &str = "ntpserver.conf";

async fn load_config(path: &str) -> io::Result<RelayConfig> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => {
            let config = RelayConfig::from_conf_str(&text)?;
            info!("loaded configuration from {}", path);
            Ok(config)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("{} not found, using defaults", path);
            Ok(RelayConfig::default())
        }
        Err(e) => Err(e),
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(&path).await?;

    let server = NtpServerBuilder::from_config(&config).build().await?;
    match server.upstream_addr() {
        Some(upstream) => info!(
            "serving on {}, upstream {} every {:?}",
            server.local_addr()?,
            upstream,
            config.sync_interval
        ),
        None if config.local_reference.is_some() => {
            info!("serving on {}, local clock as reference", server.local_addr()?)
        }
        None => warn!(
            "serving on {} with no upstream; replies advertise an unsynchronized clock",
            server.local_addr()?
        ),
    }

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    }
}
