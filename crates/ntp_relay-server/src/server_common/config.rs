// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Relay configuration and the `ntpserver.conf` line format.
//!
//! The file is a list of `key:value` lines. Blank lines and lines starting
//! with `#` are ignored, and an empty value leaves the default in place.
//!
//! ```text
//! # upstream to follow; ":123" is assumed when no port is given
//! ntpserverip:10.10.10.10
//! # seconds between upstream exchanges
//! updatefrequency:3600
//! ```
//!
//! | Key | Field |
//! |-----|-------|
//! | `ntpserverip` | [`RelayConfig::upstream`] |
//! | `updatefrequency` | [`RelayConfig::sync_interval`] (seconds) |
//! | `listen` | [`RelayConfig::listen`] |
//! | `timeout` | [`RelayConfig::sync_timeout`] (seconds) |
//! | `failurethreshold` | [`RelayConfig::failure_threshold`] |
//! | `precision` | [`RelayConfig::precision`] (log2 seconds) |
//! | `localstratum` | [`RelayConfig::local_reference`] (`LOCL` at that stratum) |

use std::time::Duration;

use crate::error::ConfigError;
use crate::protocol::{self, Stratum};

use super::LocalReference;

/// Everything needed to start a relay.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelayConfig {
    /// Address the serving socket binds to.
    pub listen: String,
    /// Upstream server as `host:port`, or `None` to run without one.
    pub upstream: Option<String>,
    /// Time between upstream exchanges.
    pub sync_interval: Duration,
    /// Bound on one upstream exchange.
    pub sync_timeout: Duration,
    /// Consecutive upstream failures before the clock state degrades.
    pub failure_threshold: u32,
    /// Advertised precision, in log2 seconds.
    pub precision: i8,
    /// Serve the local clock as a reference when no upstream is configured.
    pub local_reference: Option<LocalReference>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            listen: format!("0.0.0.0:{}", protocol::PORT),
            upstream: None,
            sync_interval: Duration::from_secs(3600),
            sync_timeout: Duration::from_secs(5),
            failure_threshold: 3,
            precision: -20,
            local_reference: None,
        }
    }
}

impl RelayConfig {
    /// Parse a configuration file, starting from the defaults.
    pub fn from_conf_str(text: &str) -> Result<Self, ConfigError> {
        let mut config = RelayConfig::default();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once(':')
                .ok_or(ConfigError::MalformedLine { line: line_no })?;
            let key = key.trim();
            let value = value.trim();

            match key.to_ascii_lowercase().as_str() {
                "ntpserverip" => {
                    config.upstream = non_empty(value).map(with_default_port);
                }
                "updatefrequency" => {
                    if let Some(v) = non_empty(value) {
                        config.sync_interval = parse_secs("updatefrequency", v)?;
                    }
                }
                "listen" => {
                    if let Some(v) = non_empty(value) {
                        config.listen = with_default_port(v);
                    }
                }
                "timeout" => {
                    if let Some(v) = non_empty(value) {
                        config.sync_timeout = parse_secs("timeout", v)?;
                    }
                }
                "failurethreshold" => {
                    if let Some(v) = non_empty(value) {
                        config.failure_threshold = match v.parse::<u32>() {
                            Ok(n) if n > 0 => n,
                            _ => return Err(invalid("failurethreshold", v, "expected a positive integer")),
                        };
                    }
                }
                "precision" => {
                    if let Some(v) = non_empty(value) {
                        config.precision = v
                            .parse::<i8>()
                            .map_err(|_| invalid("precision", v, "expected an integer in -128..=127"))?;
                    }
                }
                "localstratum" => {
                    config.local_reference = match non_empty(value) {
                        None => None,
                        Some(v) => match v.parse::<u8>() {
                            Ok(s) if (Stratum::PRIMARY.0..=Stratum::SECONDARY_MAX.0).contains(&s) => {
                                Some(LocalReference::locl(s))
                            }
                            _ => return Err(invalid("localstratum", v, "expected a stratum in 1..=15")),
                        },
                    };
                }
                _ => {
                    return Err(ConfigError::UnknownKey {
                        line: line_no,
                        key: key.to_string(),
                    });
                }
            }
        }

        Ok(config)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

/// Append the NTP port unless `addr` already names one.
fn with_default_port(addr: &str) -> String {
    if addr.parse::<std::net::SocketAddr>().is_ok() {
        return addr.to_string();
    }
    if addr.parse::<std::net::Ipv6Addr>().is_ok() {
        return format!("[{addr}]:{}", protocol::PORT);
    }
    // host:port, or a bracketed IPv6 literal with a port
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') || host.ends_with(']') => {
            if port.parse::<u16>().is_ok() {
                return addr.to_string();
            }
            format!("{addr}:{}", protocol::PORT)
        }
        _ => format!("{addr}:{}", protocol::PORT),
    }
}

fn parse_secs(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(invalid(key, value, "expected a positive number of seconds")),
    }
}

fn invalid(key: &'static str, value: &str, reason: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason,
    }
}
