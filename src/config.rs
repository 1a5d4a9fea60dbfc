use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::chatterbot::{Endpoints, Provider};
use crate::prompt::SecretEntry;
use crate::relay::{ImRelayConfig, ReplyNormalization, SeenPolicy, SmsRelayConfig};
use crate::transport::Sl4aConfig;

/// Default SL4A facade host when neither config nor `AP_HOST` sets one.
const DEFAULT_SL4A_HOST: &str = "127.0.0.1";

/// Upper bound for the Telegram long-poll timeout. The Bot client gives up
/// on requests after 17 seconds.
const MAX_POLL_TIMEOUT_SECS: u32 = 15;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file '{}': {source}", path.display())]
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    #[error("failed to parse config file '{}': {source}", path.display())]
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    #[error("config validation error: {0}")]
    Validation(String),
}

#[derive(Deserialize, Default)]
struct ConfigFile {
    /// Chatterbot to talk to. Prompted for at startup when absent.
    provider: Option<Provider>,
    /// Directory for state files (logs). Defaults to current directory.
    data_dir: Option<String>,
    #[serde(default)]
    endpoints: Endpoints,
    #[serde(default)]
    sms: SmsFile,
    #[serde(default)]
    im: ImFile,
}

#[derive(Deserialize)]
#[serde(default)]
struct SmsFile {
    /// SL4A facade host; falls back to `AP_HOST`.
    host: Option<String>,
    /// SL4A facade port; falls back to `AP_PORT`.
    port: Option<u16>,
    /// SL4A handshake secret; falls back to `AP_HANDSHAKE`.
    handshake: Option<String>,
    poll_interval_secs: u64,
    mark_read: bool,
    /// Max identifiers remembered (unbounded when unset).
    seen_capacity: Option<usize>,
    /// Forget identifiers after this many seconds (never when unset).
    seen_ttl_secs: Option<u64>,
}

impl Default for SmsFile {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            handshake: None,
            poll_interval_secs: 10,
            mark_read: false,
            seen_capacity: None,
            seen_ttl_secs: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct ImFile {
    /// Telegram bot token. Prompted for at startup when absent.
    bot_token: Option<String>,
    auto_reconnect: bool,
    normalize_replies: ReplyNormalization,
    password_entry: SecretEntry,
    /// Chat ids reported as contacts on session start.
    roster: Vec<i64>,
    poll_timeout_secs: u32,
}

impl Default for ImFile {
    fn default() -> Self {
        Self {
            bot_token: None,
            auto_reconnect: true,
            normalize_replies: ReplyNormalization::None,
            password_entry: SecretEntry::Auto,
            roster: Vec::new(),
            poll_timeout_secs: 10,
        }
    }
}

/// SMS mode settings.
#[derive(Debug, Clone)]
pub struct SmsSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub handshake: Option<String>,
    pub relay: SmsRelayConfig,
}

/// IM mode settings.
#[derive(Debug, Clone)]
pub struct ImSettings {
    pub bot_token: Option<String>,
    pub password_entry: SecretEntry,
    pub roster: Vec<i64>,
    pub poll_timeout_secs: u32,
    pub relay: ImRelayConfig,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub provider: Option<Provider>,
    /// Directory for state files (logs).
    pub data_dir: PathBuf,
    pub endpoints: Endpoints,
    pub sms: SmsSettings,
    pub im: ImSettings,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;
        Self::from_file(file)
    }

    /// Configuration with every default, for running without a file.
    pub fn defaults() -> Self {
        Self {
            provider: None,
            data_dir: PathBuf::from("."),
            endpoints: Endpoints::default(),
            sms: SmsSettings {
                host: None,
                port: None,
                handshake: None,
                relay: SmsRelayConfig::default(),
            },
            im: ImSettings {
                bot_token: None,
                password_entry: SecretEntry::default(),
                roster: Vec::new(),
                poll_timeout_secs: ImFile::default().poll_timeout_secs,
                relay: ImRelayConfig::default(),
            },
        }
    }

    fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        if let Some(Provider::Pandorabots { ref bot_id }) = file.provider
            && bot_id.trim().is_empty()
        {
            return Err(ConfigError::Validation("provider.bot_id is required for pandorabots".into()));
        }

        let sms = file.sms;
        if sms.poll_interval_secs == 0 {
            return Err(ConfigError::Validation("sms.poll_interval_secs must be greater than 0".into()));
        }
        if sms.seen_capacity == Some(0) {
            return Err(ConfigError::Validation("sms.seen_capacity must be greater than 0".into()));
        }
        let seen = SeenPolicy {
            capacity: sms.seen_capacity,
            ttl: sms.seen_ttl_secs.map(Duration::from_secs),
        };
        // an evicted id that is still unread would be answered again
        if seen.is_bounded() && !sms.mark_read {
            return Err(ConfigError::Validation(
                "sms.seen_capacity / sms.seen_ttl_secs require sms.mark_read".into(),
            ));
        }

        let im = file.im;
        if let Some(ref token) = im.bot_token {
            validate_bot_token(token)?;
        }
        if im.poll_timeout_secs > MAX_POLL_TIMEOUT_SECS {
            return Err(ConfigError::Validation(format!(
                "im.poll_timeout_secs must be at most {MAX_POLL_TIMEOUT_SECS}"
            )));
        }

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            provider: file.provider,
            data_dir,
            endpoints: file.endpoints,
            sms: SmsSettings {
                host: sms.host,
                port: sms.port,
                handshake: sms.handshake,
                relay: SmsRelayConfig {
                    poll_interval: Duration::from_secs(sms.poll_interval_secs),
                    mark_read: sms.mark_read,
                    seen,
                },
            },
            im: ImSettings {
                bot_token: im.bot_token,
                password_entry: im.password_entry,
                roster: im.roster,
                poll_timeout_secs: im.poll_timeout_secs,
                relay: ImRelayConfig {
                    auto_reconnect: im.auto_reconnect,
                    normalization: im.normalize_replies,
                },
            },
        })
    }

    /// Where to reach the SL4A facade, filling gaps from the process environment.
    pub fn sl4a(&self) -> Result<Sl4aConfig, ConfigError> {
        self.sl4a_with_env(|key| std::env::var(key).ok())
    }

    fn sl4a_with_env<F>(&self, env: F) -> Result<Sl4aConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = self
            .sms
            .host
            .clone()
            .or_else(|| env("AP_HOST"))
            .unwrap_or_else(|| DEFAULT_SL4A_HOST.to_string());

        let port = match self.sms.port {
            Some(port) => port,
            None => {
                let raw = env("AP_PORT").ok_or_else(|| {
                    ConfigError::Validation("SL4A port not set (sms.port or AP_PORT)".into())
                })?;
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::Validation(format!("AP_PORT is not a port number: '{raw}'")))?
            }
        };

        let handshake = self.sms.handshake.clone().or_else(|| env("AP_HANDSHAKE"));

        Ok(Sl4aConfig { host, port, handshake })
    }
}

/// Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric.
pub fn validate_bot_token(token: &str) -> Result<(), ConfigError> {
    let token_parts: Vec<&str> = token.split(':').collect();
    if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
        return Err(ConfigError::Validation(
            "bot token appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
        ));
    }
    Ok(())
}
