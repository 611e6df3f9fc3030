//! Server configuration from environment variables

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 3338);
const DEFAULT_QUESTION_TIMEOUT_MS: u64 = 2000;
const DEFAULT_IDLE_MINUTES: u64 = 120;
const DEFAULT_SWEEP_SECONDS: u64 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// JSON question bank on disk; None uses the bundled bank
    pub questions_path: Option<PathBuf>,
    pub question_timeout: Duration,
    /// Sessions with no activity for this long are deleted
    pub idle_timeout: Duration,
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR,
            questions_path: None,
            question_timeout: Duration::from_millis(DEFAULT_QUESTION_TIMEOUT_MS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_MINUTES * 60),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_SECONDS),
        }
    }
}

/// Read a trimmed, non-empty env var
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Parse a positive integer env var, warning and falling back on bad input
fn env_u64(name: &str, default: u64) -> u64 {
    match env_value(name) {
        None => default,
        Some(raw) => match raw.parse::<u64>() {
            Ok(value) if value > 0 => value,
            _ => {
                tracing::warn!("Ignoring {}={:?}, using default {}", name, raw, default);
                default
            }
        },
    }
}

impl ServerConfig {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let addr = match env_value("FEUDDASH_ADDR") {
            None => defaults.addr,
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(
                    "Ignoring FEUDDASH_ADDR={:?} ({}), using {}",
                    raw,
                    e,
                    defaults.addr
                );
                defaults.addr
            }),
        };

        Self {
            addr,
            questions_path: env_value("FEUDDASH_QUESTIONS").map(PathBuf::from),
            question_timeout: Duration::from_millis(env_u64(
                "FEUDDASH_QUESTION_TIMEOUT_MS",
                DEFAULT_QUESTION_TIMEOUT_MS,
            )),
            idle_timeout: Duration::from_secs(
                env_u64("FEUDDASH_IDLE_MINUTES", DEFAULT_IDLE_MINUTES) * 60,
            ),
            sweep_interval: Duration::from_secs(env_u64(
                "FEUDDASH_SWEEP_SECONDS",
                DEFAULT_SWEEP_SECONDS,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "FEUDDASH_ADDR",
        "FEUDDASH_QUESTIONS",
        "FEUDDASH_QUESTION_TIMEOUT_MS",
        "FEUDDASH_IDLE_MINUTES",
        "FEUDDASH_SWEEP_SECONDS",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_when_unset() {
        clear_env();
        assert_eq!(ServerConfig::from_env(), ServerConfig::default());
        assert_eq!(ServerConfig::default().addr.to_string(), "0.0.0.0:3338");
    }

    #[test]
    #[serial]
    fn test_reads_overrides() {
        clear_env();
        std::env::set_var("FEUDDASH_ADDR", "127.0.0.1:9000");
        std::env::set_var("FEUDDASH_QUESTIONS", " /tmp/bank.json ");
        std::env::set_var("FEUDDASH_QUESTION_TIMEOUT_MS", "500");
        std::env::set_var("FEUDDASH_IDLE_MINUTES", "5");

        let config = ServerConfig::from_env();
        assert_eq!(config.addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.questions_path, Some(PathBuf::from("/tmp/bank.json")));
        assert_eq!(config.question_timeout, Duration::from_millis(500));
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_malformed_values_fall_back() {
        clear_env();
        std::env::set_var("FEUDDASH_ADDR", "not an address");
        std::env::set_var("FEUDDASH_SWEEP_SECONDS", "0");
        std::env::set_var("FEUDDASH_IDLE_MINUTES", "soon");

        let config = ServerConfig::from_env();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.addr, DEFAULT_ADDR);
        clear_env();
    }
}
