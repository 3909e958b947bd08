// Projekt-Konfiguration: Konstanten und Laufzeit-Einstellungen

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use embassy_time::Duration;
use pilight_core::{ConfigError, FadeSettings, LightConfig};

// ============================================================================
// pigpio Konfiguration
// ============================================================================

/// Standard-Port des pigpio Daemons
pub const PIGPIO_PORT: u16 = 8888;

/// Timeout für den Verbindungsaufbau zu einem Controller
pub const PIGPIO_CONNECT_TIMEOUT_MS: u64 = 500;

/// Lese-/Schreib-Timeout pro Kommando
pub const PIGPIO_IO_TIMEOUT_MS: u64 = 500;

/// Wartezeit nach einem Verbindungsfehler vor erneutem Versuch
pub const PIGPIO_RECONNECT_DELAY_SECS: u64 = 5;

// ============================================================================
// HTTP Server Konfiguration
// ============================================================================

/// HTTP Buffer-Größe in Bytes (pro Verbindung)
pub const HTTP_BUFFER_SIZE: usize = 2048;

/// WebSocket Message Buffer-Größe in Bytes
/// Reicht für `set_lights` mit einigen Dutzend Streifen
pub const WEBSOCKET_BUFFER_SIZE: usize = 4096;

/// Nachrichten-Kapazität des Status-Channels
pub const STATUS_CHANNEL_CAPACITY: usize = 4;

/// Maximale Anzahl gleichzeitiger WebSocket-Clients
pub const STATUS_SUBSCRIBERS: usize = 16;

// ============================================================================
// Laufzeit-Einstellungen (Environment / .env)
// ============================================================================

pub const ENV_LIGHTS: &str = "PILIGHT_LIGHTS";
pub const ENV_HTTP_ADDR: &str = "PILIGHT_HTTP_ADDR";
pub const ENV_FADE_TIME_MS: &str = "PILIGHT_FADE_TIME_MS";
pub const ENV_STEP_SIZE: &str = "PILIGHT_STEP_SIZE";
pub const ENV_LOWER_LIMIT: &str = "PILIGHT_LOWER_LIMIT";
pub const ENV_UPPER_LIMIT: &str = "PILIGHT_UPPER_LIMIT";
pub const ENV_OFF_ON_START: &str = "PILIGHT_OFF_ON_START";

pub const DEFAULT_LIGHTS_FILE: &str = "lights.json";
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";

/// Einstellungen des Servers
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    lights_file: PathBuf,
    http_addr: SocketAddr,
    fade: FadeSettings,
    off_on_start: bool,
}

impl Settings {
    /// Liest die Einstellungen aus dem Prozess-Environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Liest die Einstellungen über eine beliebige Quelle
    ///
    /// # Fehlerbehandlung
    /// - `ConfigError::Invalid` bei nicht lesbaren Werten
    /// - `ConfigError::InvalidBounds` wenn `lower >= upper`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let lights_file = lookup(ENV_LIGHTS).unwrap_or_else(|| DEFAULT_LIGHTS_FILE.into());
        let http_addr = parse_or(&lookup, ENV_HTTP_ADDR, || {
            SocketAddr::from(([0, 0, 0, 0], 8080))
        })?;

        let defaults = FadeSettings::new();
        let fade_time_ms = parse_or(&lookup, ENV_FADE_TIME_MS, || {
            defaults.fade_time().as_millis()
        })?;
        let step_size = parse_or(&lookup, ENV_STEP_SIZE, || i32::from(defaults.step_size()))?;
        let lower = parse_or(&lookup, ENV_LOWER_LIMIT, || i32::from(defaults.lower_limit()))?;
        let upper = parse_or(&lookup, ENV_UPPER_LIMIT, || i32::from(defaults.upper_limit()))?;

        let fade = FadeSettings::new()
            .with_fade_time(Duration::from_millis(fade_time_ms))
            .with_step_size(step_size)
            .with_lower_limit(lower)
            .with_upper_limit(upper);
        fade.validate()?;

        let off_on_start = parse_or(&lookup, ENV_OFF_ON_START, || false)?;

        Ok(Self {
            lights_file: lights_file.into(),
            http_addr,
            fade,
            off_on_start,
        })
    }

    pub fn lights_file(&self) -> &Path {
        &self.lights_file
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    pub fn fade(&self) -> FadeSettings {
        self.fade
    }

    /// Alle Streifen beim Start ausschalten
    pub fn off_on_start(&self) -> bool {
        self.off_on_start
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: impl FnOnce() -> T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default()),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.into(),
            value,
        }),
    }
}

/// Lädt die Licht-Konfiguration (JSON)
pub fn load_light_config(path: &Path) -> anyhow::Result<LightConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read light file {}", path.display()))?;
    parse_light_config(&content).with_context(|| format!("invalid light file {}", path.display()))
}

pub fn parse_light_config(content: &str) -> anyhow::Result<LightConfig> {
    Ok(serde_json::from_str(content)?)
}
