//! Client configuration at `~/.roomchat/config.toml`.
//!
//! Every key is optional. CLI flags always override config file values.

use anyhow::{Context, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use roomchat_client::{ClientConfig, DisplayZone, JoinMode, TlsPolicy, UnknownEventPolicy};

/// Top-level config file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// `ws://` or `wss://` endpoint.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    #[serde(default = "default_auth_token")]
    pub auth_token: String,

    /// Room joined after connecting.
    #[serde(default = "default_room_id")]
    pub room_id: String,

    #[serde(default)]
    pub username: String,

    /// "fixed" joins straight away; "prompt" asks for username and room first.
    #[serde(default)]
    pub join_mode: JoinMode,

    /// Minimum TLS version: "1.2" or "1.3".
    #[serde(default)]
    pub tls_min: TlsPolicy,

    /// "log" or "ignore".
    #[serde(default)]
    pub unknown_events: UnknownEventPolicy,

    /// Offset for message timestamps such as "+07:00". Local time when unset.
    #[serde(default)]
    pub utc_offset: Option<String>,

    /// Interval between queue drains, in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            auth_token: default_auth_token(),
            room_id: default_room_id(),
            username: String::new(),
            join_mode: JoinMode::default(),
            tls_min: TlsPolicy::default(),
            unknown_events: UnknownEventPolicy::default(),
            utc_offset: None,
            tick_ms: default_tick_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_server_url() -> String {
    "ws://localhost:4000".to_string()
}

fn default_auth_token() -> String {
    "12345".to_string()
}

fn default_room_id() -> String {
    "room1".to_string()
}

fn default_tick_ms() -> u64 {
    16
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub token: Option<String>,
    pub room: Option<String>,
    pub username: Option<String>,
    pub prompt: bool,
}

impl Config {
    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &str) -> Result<Self> {
        let path = Path::new(path);
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(url) = overrides.url {
            self.server_url = url;
        }
        if let Some(token) = overrides.token {
            self.auth_token = token;
        }
        if let Some(room) = overrides.room {
            self.room_id = room;
        }
        if let Some(username) = overrides.username {
            self.username = username;
        }
        if overrides.prompt {
            self.join_mode = JoinMode::Prompt;
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    /// Build the library configuration.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let zone = match self.utc_offset.as_deref().map(str::trim) {
            None | Some("") => DisplayZone::Local,
            Some(offset) => DisplayZone::Fixed(parse_offset(offset)?),
        };

        Ok(ClientConfig {
            server_url: self.server_url.clone(),
            auth_token: self.auth_token.clone(),
            room_id: self.room_id.clone(),
            username: self.username.clone(),
            join_mode: self.join_mode,
            tls: self.tls_min,
            unknown_events: self.unknown_events,
            zone,
            connect_timeout_secs: self.connect_timeout_secs,
        })
    }
}

/// Parse `+HH:MM` / `-HH:MM`; `Z` and `UTC` mean zero.
fn parse_offset(offset: &str) -> Result<FixedOffset> {
    if offset.eq_ignore_ascii_case("z") || offset.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).context("zero offset");
    }
    offset
        .parse::<FixedOffset>()
        .with_context(|| format!("invalid utc_offset '{offset}' (expected e.g. +07:00)"))
}
