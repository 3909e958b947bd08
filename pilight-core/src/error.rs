//! Fehler-Typen der Lichtsteuerung

use alloc::string::String;
use core::fmt;

/// Fehler bei Operationen auf einem einzelnen Streifen
///
/// Wird innerhalb von Batch-Operationen lokal behandelt: der Streifen wird
/// übersprungen, der Rest der Anfrage läuft weiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LightError {
    /// Kein konfigurierter Controller kennt diesen Namen
    UnknownLight(String),
    /// Der Controller des Streifens ist nicht erreichbar
    ControllerUnreachable(String),
}

impl fmt::Display for LightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LightError::UnknownLight(name) => write!(f, "unknown light '{name}'"),
            LightError::ControllerUnreachable(name) => {
                write!(f, "controller of light '{name}' is unreachable")
            }
        }
    }
}

impl core::error::Error for LightError {}

/// Fehler in Konfiguration oder Fade-Einstellungen
///
/// Beim Start fatal, bevor irgendeine Anfrage bedient wird.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `lower_limit >= upper_limit`
    InvalidBounds { lower: u8, upper: u8 },
    /// Pin-Liste hat nicht genau drei Einträge oder enthält keine Zahl
    MalformedPins { light: String, value: String },
    /// Ein Name taucht unter mehreren Controllern auf
    DuplicateLight(String),
    /// Anzahl der Controller-Handles passt nicht zur Registry
    ControllerCount { expected: usize, found: usize },
    /// Konfigurationswert konnte nicht gelesen werden
    Invalid { key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidBounds { lower, upper } => write!(
                f,
                "lower limit {lower} must be below upper limit {upper}"
            ),
            ConfigError::MalformedPins { light, value } => write!(
                f,
                "light '{light}': expected three comma separated pins, got '{value}'"
            ),
            ConfigError::DuplicateLight(name) => {
                write!(f, "light '{name}' is configured for more than one controller")
            }
            ConfigError::ControllerCount { expected, found } => write!(
                f,
                "expected {expected} controller handles, got {found}"
            ),
            ConfigError::Invalid { key, value } => write!(f, "invalid value '{value}' for {key}"),
        }
    }
}

impl core::error::Error for ConfigError {}
