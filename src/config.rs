use anyhow::Context;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::local_ip;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024 * 1024; // 20GB
pub const DEFAULT_SESSION_IDLE_MINUTES: i64 = 12 * 60;
pub const DEFAULT_SHUTDOWN_DELAY_MS: u64 = 500;

/// Where clipboard reads and writes go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardBackend {
    /// The host operating system's clipboard
    System,
    /// A process-local buffer, for hosts without a clipboard
    Memory,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
    /// Empty disables the login gate
    pub pin: String,
    /// Secret for signing the session cookie; random per run when unset
    pub session_secret: Option<String>,
    /// `None` keeps sessions until restart
    pub session_idle_timeout: Option<chrono::Duration>,
    pub shutdown_delay: Duration,
    pub clipboard_backend: ClipboardBackend,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        let port = match var("PORT") {
            Some(v) => v.parse::<u16>().with_context(|| format!("Invalid PORT: {}", v))?,
            None => DEFAULT_PORT,
        };

        let host = match var("HOST") {
            Some(v) => v.parse::<IpAddr>().with_context(|| format!("Invalid HOST: {}", v))?,
            None => local_ip(),
        };

        let upload_dir = var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_upload_dir);

        let max_upload_bytes = var("MAX_UPLOAD_SIZE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let session_idle_minutes = var("SESSION_IDLE_MINUTES")
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(DEFAULT_SESSION_IDLE_MINUTES);

        let shutdown_delay_ms = var("SHUTDOWN_DELAY_MS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SHUTDOWN_DELAY_MS);

        let clipboard_backend = match var("CLIPBOARD_BACKEND").as_deref() {
            Some(v) if v.eq_ignore_ascii_case("memory") => ClipboardBackend::Memory,
            Some(v) if !v.eq_ignore_ascii_case("system") => {
                anyhow::bail!("Invalid CLIPBOARD_BACKEND: {} (expected system or memory)", v)
            }
            _ => ClipboardBackend::System,
        };

        Ok(Self {
            host,
            port,
            upload_dir,
            max_upload_bytes,
            pin: std::env::var("SHARE_PIN").unwrap_or_default(),
            session_secret: var("SESSION_SECRET"),
            session_idle_timeout: Some(session_idle_minutes)
                .filter(|minutes| *minutes > 0)
                .and_then(chrono::Duration::try_minutes),
            shutdown_delay: Duration::from_millis(shutdown_delay_ms),
            clipboard_backend,
        })
    }

    /// Config suitable for tests: loopback, in-memory clipboard, short delays
    pub fn for_upload_dir(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            upload_dir: upload_dir.into(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            pin: String::new(),
            session_secret: None,
            session_idle_timeout: Some(chrono::Duration::minutes(DEFAULT_SESSION_IDLE_MINUTES)),
            shutdown_delay: Duration::from_millis(10),
            clipboard_backend: ClipboardBackend::Memory,
        }
    }

    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = pin.into();
        self
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: u64) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

/// `uploads` next to the executable, or in the working directory when the
/// executable path is unknown.
fn default_upload_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("uploads")))
        .unwrap_or_else(|| PathBuf::from("./uploads"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_upload_dir_is_named_uploads() {
        assert!(default_upload_dir().ends_with("uploads"));
    }

    #[test]
    fn test_builder_overrides() {
        let config = Config::for_upload_dir("/tmp/share")
            .with_pin("2468")
            .with_max_upload_bytes(1024);

        assert_eq!(config.pin, "2468");
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/share"));
        assert_eq!(config.clipboard_backend, ClipboardBackend::Memory);
    }
}
