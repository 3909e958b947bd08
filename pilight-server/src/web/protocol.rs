// WebSocket-Protokoll-Definitionen
// Definiert die JSON-Nachrichten für Client ↔ Server Kommunikation

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Formularfelder der Oberfläche: `"lights[ub]" → beliebiger Wert`
///
/// Nur die Schlüssel zählen, die Werte (Checkbox-Status) werden ignoriert.
pub type LightFields = BTreeMap<String, serde_json::Value>;

/// Client → Server Nachrichten
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsClientMessage {
    /// Feste Farbe für die ausgewählten Streifen
    SetLights {
        red: u8,
        green: u8,
        blue: u8,
        #[serde(default)]
        lights: LightFields,
    },
    /// Button "on", "off" oder "fade"
    Control {
        id: String,
        #[serde(default)]
        lights: LightFields,
    },
}

impl WsClientMessage {
    /// Feldnamen der ausgewählten Streifen
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        let (WsClientMessage::SetLights { lights, .. } | WsClientMessage::Control { lights, .. }) =
            self;
        lights.keys().map(String::as_str)
    }
}

/// Ein Controller mit seinen Streifen (für den Seitenaufbau)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerInfo<'a> {
    pub address: &'a str,
    pub lights: Vec<&'a str>,
}

/// Server → Client Nachrichten
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerMessage<'a> {
    /// Alle konfigurierten Streifen, einmal nach dem Verbindungsaufbau
    Lights { controllers: Vec<ControllerInfo<'a>> },
    /// Zustand nach jedem Kommando
    Status {
        fading: &'a [String],
        skipped: &'a [String],
    },
    Error { message: &'a str },
}

/// Broadcast nach jedem Kommando (über den Status-Channel)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Streifen mit gesetztem Fade-Flag
    pub fading: Vec<String>,
    /// Übersprungene Streifen des letzten Kommandos mit Grund
    pub skipped: Vec<String>,
}

impl StatusUpdate {
    pub fn as_message(&self) -> WsServerMessage<'_> {
        WsServerMessage::Status {
            fading: &self.fading,
            skipped: &self.skipped,
        }
    }
}
