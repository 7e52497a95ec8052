//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Default listening window for a single voice session
pub const DEFAULT_LISTEN_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default lifetime of a visible notification
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_millis(3000);

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Language active at startup
    pub default_language: String,

    /// Deadline for a listening session
    pub listen_timeout: Duration,

    /// Auto-hide delay for notifications
    pub notification_ttl: Duration,

    /// Whether the speech capture capability is offered at all
    pub capture_enabled: bool,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("agrivoice");

        let socket_path = match std::env::var("AGRIVOICE_SOCKET") {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => data_dir.join("daemon.sock"),
        };

        let default_language = std::env::var("AGRIVOICE_LANG")
            .ok()
            .map(|lang| lang.trim().to_lowercase())
            .filter(|lang| !lang.is_empty())
            .unwrap_or_else(|| "en".to_string());

        let listen_timeout = duration_from_env("AGRIVOICE_LISTEN_TIMEOUT_MS")?
            .unwrap_or(DEFAULT_LISTEN_TIMEOUT);
        let notification_ttl = duration_from_env("AGRIVOICE_NOTIFY_TTL_MS")?
            .unwrap_or(DEFAULT_NOTIFICATION_TTL);

        let capture_enabled = std::env::var("AGRIVOICE_CAPTURE")
            .map(|v| parse_switch(&v))
            .unwrap_or(true);

        Ok(Self {
            socket_path,
            data_dir,
            default_language,
            listen_timeout,
            notification_ttl,
            capture_enabled,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

fn duration_from_env(key: &str) -> Result<Option<Duration>> {
    match std::env::var(key) {
        Ok(raw) => {
            let ms: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{key} must be a number of milliseconds, got {raw:?}"))?;
            Ok(Some(Duration::from_millis(ms)))
        }
        Err(_) => Ok(None),
    }
}

/// "off", "false", "0" and "no" disable a switch; anything else enables it
fn parse_switch(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "off" | "false" | "0" | "no"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load() {
        let config = Config::load().unwrap();
        assert!(config.data_dir.to_string_lossy().contains("agrivoice"));
        assert!(!config.default_language.is_empty());
    }

    #[test]
    fn test_default_timings() {
        assert_eq!(DEFAULT_LISTEN_TIMEOUT, Duration::from_secs(5));
        assert_eq!(DEFAULT_NOTIFICATION_TTL, Duration::from_secs(3));
    }

    #[test]
    fn test_parse_switch() {
        assert!(!parse_switch("off"));
        assert!(!parse_switch(" FALSE "));
        assert!(!parse_switch("0"));
        assert!(parse_switch("on"));
        assert!(parse_switch("yes"));
    }
}
