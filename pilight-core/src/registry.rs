//! Light Registry
//!
//! Bildet Streifen-Namen auf Controller und Pins ab. Wird einmal beim Start
//! aus der [`LightConfig`] gebaut und danach nur noch gelesen.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::config::LightConfig;
use crate::error::{ConfigError, LightError};
use crate::types::{ControllerId, LightStrip, PinTriple};

#[derive(Debug, Clone, Default)]
pub struct LightRegistry {
    controllers: Vec<String>,
    lights: Vec<LightStrip>,
    by_name: BTreeMap<String, usize>,
}

impl LightRegistry {
    /// Baut die Registry aus der Konfiguration
    ///
    /// # Fehlerbehandlung
    /// - `ConfigError::MalformedPins` bei einer ungültigen Pin-Liste
    /// - `ConfigError::DuplicateLight` wenn ein Name unter mehreren Controllern steht
    pub fn from_config(config: &LightConfig) -> Result<Self, ConfigError> {
        let mut registry = Self::default();

        for address in config.addresses() {
            let controller = registry.controllers.len();
            registry.controllers.push(address.into());

            for (name, pins) in config.lights(address) {
                if registry.by_name.contains_key(name) {
                    return Err(ConfigError::DuplicateLight(name.into()));
                }
                let pins = PinTriple::parse(name, pins)?;
                registry.by_name.insert(name.into(), registry.lights.len());
                registry.lights.push(LightStrip {
                    name: name.into(),
                    controller,
                    pins,
                });
            }
        }

        Ok(registry)
    }

    /// Streifen nach Name
    pub fn light(&self, name: &str) -> Result<&LightStrip, LightError> {
        self.by_name
            .get(name)
            .map(|&index| &self.lights[index])
            .ok_or_else(|| LightError::UnknownLight(name.into()))
    }

    /// Controller, der den Streifen steuert
    pub fn resolve_controller(&self, name: &str) -> Result<ControllerId, LightError> {
        self.light(name).map(|light| light.controller)
    }

    /// Pins des Streifens in R,G,B-Reihenfolge
    pub fn resolve_pins(&self, name: &str) -> Result<PinTriple, LightError> {
        self.light(name).map(|light| light.pins)
    }

    /// Namen aller Streifen eines Controllers
    pub fn light_names(&self, controller: ControllerId) -> impl Iterator<Item = &str> {
        self.lights_of(controller).map(|light| light.name.as_str())
    }

    pub fn lights_of(&self, controller: ControllerId) -> impl Iterator<Item = &LightStrip> {
        self.lights
            .iter()
            .filter(move |light| light.controller == controller)
    }

    pub fn lights(&self) -> impl Iterator<Item = &LightStrip> {
        self.lights.iter()
    }

    /// Controller-Adressen, Index = [`ControllerId`]
    pub fn controller_addresses(&self) -> impl ExactSizeIterator<Item = &str> {
        self.controllers.iter().map(String::as_str)
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}
