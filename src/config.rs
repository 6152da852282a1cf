// src/config.rs
use std::path::{Path, PathBuf};
use std::time::Duration;
use plotters::style::RGBColor;
use serde::Deserialize;
use crate::drivers::{ConnectionTimings, ScopeError, ScopeStyle};
pub const CONFIG_ENV: &str = "BIOSCOPE_CONFIG";
pub const URL_ENV: &str = "BIOSCOPE_URL";
pub const DEFAULT_CONFIG_FILE: &str = "bioscope.toml";
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconnectConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}
impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 2_000,
            max_delay_ms: 8_000,
        }
    }
}
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub interval_ms: u64,
    pub pong_timeout_ms: u64,
    pub min_idle_ms: u64,
    /// Unset disables the silence watchdog.
    pub silence_timeout_ms: Option<u64>,
    pub health_check_ms: u64,
}
impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: 25_000,
            pong_timeout_ms: 20_000,
            min_idle_ms: 3_000,
            silence_timeout_ms: None,
            health_check_ms: 2_000,
        }
    }
}
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct BufferConfig {
    pub min_window_seconds: f64,
    pub export_capacity: usize,
}
impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            min_window_seconds: 1.5,
            export_capacity: 50_000,
        }
    }
}
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub refresh_ms: u64,
    pub base_capacity: usize,
    pub grid_x: u32,
    pub grid_y: u32,
    pub minor_per_major: u32,
    pub background: [u8; 3],
    pub grid_minor: [u8; 3],
    pub grid_major: [u8; 3],
    pub primary: [u8; 3],
    pub envelope: [u8; 3],
}
impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            refresh_ms: 16,
            base_capacity: 1_200,
            grid_x: 10,
            grid_y: 8,
            minor_per_major: 5,
            background: [254, 254, 254],
            grid_minor: [200, 224, 200],
            grid_major: [144, 192, 144],
            primary: [0, 102, 204],
            envelope: [220, 38, 38],
        }
    }
}
/// Everything the viewer reads at startup.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub url: String,
    pub status_url: Option<String>,
    /// Inbound values are divided by this (the firmware may send fixed-point).
    pub wire_scale: f64,
    pub reconnect: ReconnectConfig,
    pub heartbeat: HeartbeatConfig,
    pub status_debounce_ms: u64,
    pub status_poll_ms: u64,
    pub buffer: BufferConfig,
    pub render: RenderConfig,
    pub export_dir: PathBuf,
}
impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://192.168.4.1/ws".to_owned(),
            status_url: Some("http://192.168.4.1/api/status".to_owned()),
            wire_scale: 1.0,
            reconnect: ReconnectConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            status_debounce_ms: 1_500,
            status_poll_ms: 1_000,
            buffer: BufferConfig::default(),
            render: RenderConfig::default(),
            export_dir: PathBuf::from("."),
        }
    }
}
impl ClientConfig {
    /// `$BIOSCOPE_CONFIG`, else `./bioscope.toml` when present, else defaults.
    /// `$BIOSCOPE_URL` then overrides the stream address.
    pub fn load() -> anyhow::Result<Self> {
        use anyhow::Context;
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(|| {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                local.is_file().then_some(local)
            });
        let mut config = match path {
            Some(path) => Self::from_file(&path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => Self::default(),
        };
        if let Ok(url) = std::env::var(URL_ENV) {
            if !url.trim().is_empty() {
                config.url = url.trim().to_owned();
            }
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
    pub fn from_file(path: &Path) -> Result<Self, ScopeError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }
    pub fn from_toml(text: &str) -> Result<Self, ScopeError> {
        Ok(toml::from_str(text)?)
    }
    pub fn validate(&self) -> Result<(), ScopeError> {
        let fail = |msg: &str| Err(ScopeError::Config(msg.to_owned()));
        if !self.url.starts_with("ws://") && !self.url.starts_with("wss://") {
            return fail("url must be a ws:// or wss:// address");
        }
        if !(self.wire_scale > 0.0) {
            return fail("wire_scale must be positive");
        }
        if self.reconnect.base_delay_ms == 0 {
            return fail("reconnect.base_delay_ms must be positive");
        }
        if self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            return fail("reconnect.max_delay_ms is below base_delay_ms");
        }
        if self.heartbeat.interval_ms == 0
            || self.heartbeat.pong_timeout_ms == 0
            || self.heartbeat.health_check_ms == 0
        {
            return fail("heartbeat intervals must be positive");
        }
        if self.heartbeat.silence_timeout_ms == Some(0) {
            return fail("heartbeat.silence_timeout_ms must be positive when set");
        }
        if self.status_poll_ms == 0 {
            return fail("status_poll_ms must be positive");
        }
        if self.buffer.export_capacity == 0 || !(self.buffer.min_window_seconds > 0.0) {
            return fail("buffer capacities must be positive");
        }
        if self.render.refresh_ms == 0 || self.render.base_capacity == 0 {
            return fail("render.refresh_ms and render.base_capacity must be positive");
        }
        if self.render.grid_x == 0 || self.render.grid_y == 0 {
            return fail("grid needs at least one division each way");
        }
        Ok(())
    }
    pub fn timings(&self) -> ConnectionTimings {
        let ms = Duration::from_millis;
        ConnectionTimings {
            base_delay: ms(self.reconnect.base_delay_ms),
            max_delay: ms(self.reconnect.max_delay_ms),
            heartbeat_interval: ms(self.heartbeat.interval_ms),
            pong_timeout: ms(self.heartbeat.pong_timeout_ms),
            min_idle: ms(self.heartbeat.min_idle_ms),
            status_debounce: ms(self.status_debounce_ms),
            health_check_interval: ms(self.heartbeat.health_check_ms),
            silence_timeout: self.heartbeat.silence_timeout_ms.map(ms),
        }
    }
    pub fn scope_style(&self) -> ScopeStyle {
        let rgb = |[r, g, b]: [u8; 3]| RGBColor(r, g, b);
        ScopeStyle {
            background: rgb(self.render.background),
            grid_minor: rgb(self.render.grid_minor),
            grid_major: rgb(self.render.grid_major),
            primary: rgb(self.render.primary),
            envelope: rgb(self.render.envelope),
            grid_x: self.render.grid_x,
            grid_y: self.render.grid_y,
            minor_per_major: self.render.minor_per_major,
            base_capacity: self.render.base_capacity,
            ..ScopeStyle::default()
        }
    }
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.render.refresh_ms)
    }
    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_ms)
    }
}
