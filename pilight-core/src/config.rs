//! Licht-Konfiguration
//!
//! Schema: Controller-Adresse → (Streifen-Name → `"pin_r,pin_g,pin_b"`).
//! Das Einlesen der Datei übernimmt der Server; hier liegt nur die Struktur.

use alloc::collections::BTreeMap;
use alloc::string::String;

/// Konfigurierte Controller und ihre Streifen
///
/// Mit dem Feature `serde` direkt aus einem JSON-Objekt deserialisierbar:
///
/// ```json
/// { "192.168.0.6": { "ur": "18,23,24", "ll": "13,19,26" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct LightConfig {
    controllers: BTreeMap<String, BTreeMap<String, String>>,
}

impl LightConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fügt einen Streifen hinzu (Builder-Variante)
    pub fn with_light(mut self, address: &str, light: &str, pins: &str) -> Self {
        self.insert_light(address, light, pins);
        self
    }

    pub fn insert_light(&mut self, address: &str, light: &str, pins: &str) {
        self.controllers
            .entry(address.into())
            .or_default()
            .insert(light.into(), pins.into());
    }

    /// Adressen aller konfigurierten Controller
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.controllers.keys().map(String::as_str)
    }

    /// Streifen eines Controllers als (Name, Pin-Liste)
    pub fn lights(&self, address: &str) -> impl Iterator<Item = (&str, &str)> {
        self.controllers
            .get(address)
            .into_iter()
            .flat_map(|lights| lights.iter().map(|(name, pins)| (name.as_str(), pins.as_str())))
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.values().all(BTreeMap::is_empty)
    }
}
