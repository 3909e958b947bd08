//! Core Types für die LED-Streifen-Steuerung
//!
//! Datenstrukturen ohne I/O-Dependencies

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::error::ConfigError;

/// GPIO-Pin am PWM-Controller (Broadcom-Nummerierung)
pub type Pin = u8;

/// Index eines Controllers in der [`LightRegistry`](crate::LightRegistry)
pub type ControllerId = usize;

/// Maximaler PWM-Wert (volle Helligkeit)
pub const PWM_MAX: u8 = 255;

/// Minimaler PWM-Wert (aus)
pub const PWM_MIN: u8 = 0;

/// Farbkanal eines RGB-Streifens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    /// Alle Kanäle in Zyklus-Reihenfolge: Rot → Grün → Blau
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    /// Nächster Kanal im Zyklus (Blau → Rot)
    pub const fn next(self) -> Self {
        match self {
            Channel::Red => Channel::Green,
            Channel::Green => Channel::Blue,
            Channel::Blue => Channel::Red,
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }
}

/// Die drei PWM-Pins eines Streifens in fester R,G,B-Reihenfolge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinTriple {
    pub red: Pin,
    pub green: Pin,
    pub blue: Pin,
}

impl PinTriple {
    pub const fn new(red: Pin, green: Pin, blue: Pin) -> Self {
        Self { red, green, blue }
    }

    /// Parst eine Pin-Liste aus der Konfiguration, z.B. `"13,19,26"`
    ///
    /// # Fehlerbehandlung
    /// `ConfigError::MalformedPins` wenn nicht genau drei Pin-Nummern angegeben sind
    pub fn parse(light: &str, value: &str) -> Result<Self, ConfigError> {
        let malformed = || ConfigError::MalformedPins {
            light: light.to_string(),
            value: value.to_string(),
        };

        let pins = value
            .split(',')
            .map(|pin| pin.trim().parse::<Pin>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| malformed())?;

        match pins.as_slice() {
            [red, green, blue] => Ok(Self::new(*red, *green, *blue)),
            _ => Err(malformed()),
        }
    }

    /// Pin für einen Farbkanal
    pub const fn pin(&self, channel: Channel) -> Pin {
        match channel {
            Channel::Red => self.red,
            Channel::Green => self.green,
            Channel::Blue => self.blue,
        }
    }

    /// Iteriert über die Pins in R,G,B-Reihenfolge
    pub fn iter(&self) -> impl Iterator<Item = Pin> {
        [self.red, self.green, self.blue].into_iter()
    }
}

/// Ein benannter RGB-Streifen an einem Controller
///
/// Wird beim Start aus der Konfiguration erzeugt und danach nicht mehr verändert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightStrip {
    pub name: String,
    pub controller: ControllerId,
    pub pins: PinTriple,
}

/// Globaler Schaltzustand für "alle an" / "alle aus"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    /// PWM-Wert, der auf jeden Pin geschrieben wird
    pub const fn duty(self) -> u8 {
        match self {
            PowerState::On => PWM_MAX,
            PowerState::Off => PWM_MIN,
        }
    }
}

/// Button-Aktion aus der Web-Oberfläche
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Alle Streifen auf volle Helligkeit
    On,
    /// Alle Streifen aus
    Off,
    /// Farbverlauf für die ausgewählten Streifen starten
    Fade,
}

impl core::convert::TryFrom<&str> for ControlAction {
    type Error = ();

    fn try_from(id: &str) -> Result<Self, Self::Error> {
        match id {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "fade" => Ok(Self::Fade),
            _ => Err(()),
        }
    }
}
