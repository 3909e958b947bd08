//! Fade-Logik und Request-Auswertung
//!
//! Funktionen ohne I/O-Dependencies (testbar!)

use alloc::vec::Vec;

use embassy_time::Duration;
use rgb::RGB8;

use crate::error::ConfigError;
use crate::types::{Channel, PWM_MAX, PWM_MIN};

/// Hand-off nach Erreichen der unteren Grenze
///
/// Faktor für den Schritt des nächsten Kanals. Ein gehaltener Kanal startet
/// mit `-step_size` und wird durch `DECR` also aufgeblendet; ein Kanal mit
/// `+step_size` wird gedimmt.
pub const DECR: i8 = -1;

/// Hand-off nach Erreichen der oberen Grenze
///
/// Ein gehaltener Kanal wird dadurch gedimmt.
pub const INCR: i8 = 1;

/// Einstellungen des Farbverlaufs
///
/// Die Setter begrenzen ihre Eingaben wie die Weboberfläche sie erwartet:
/// Schrittweite auf `[0, 255]`, untere Grenze `>= 0`, obere Grenze `<= 255`.
/// Ob `lower_limit < upper_limit` gilt, prüft erst [`FadeSettings::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeSettings {
    lower_limit: u8,
    upper_limit: u8,
    step_size: u8,
    fade_time: Duration,
}

impl Default for FadeSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl FadeSettings {
    pub const DEFAULT_LOWER_LIMIT: u8 = 5;
    pub const DEFAULT_UPPER_LIMIT: u8 = PWM_MAX;
    pub const DEFAULT_STEP_SIZE: u8 = 1;
    pub const DEFAULT_FADE_TIME: Duration = Duration::from_millis(100);

    pub const fn new() -> Self {
        Self {
            lower_limit: Self::DEFAULT_LOWER_LIMIT,
            upper_limit: Self::DEFAULT_UPPER_LIMIT,
            step_size: Self::DEFAULT_STEP_SIZE,
            fade_time: Self::DEFAULT_FADE_TIME,
        }
    }

    pub fn with_lower_limit(mut self, limit: i32) -> Self {
        self.lower_limit = clamp_pwm(limit);
        self
    }

    pub fn with_upper_limit(mut self, limit: i32) -> Self {
        self.upper_limit = clamp_pwm(limit);
        self
    }

    pub fn with_step_size(mut self, step_size: i32) -> Self {
        self.step_size = clamp_pwm(step_size);
        self
    }

    pub fn with_fade_time(mut self, fade_time: Duration) -> Self {
        self.fade_time = fade_time;
        self
    }

    pub fn lower_limit(&self) -> u8 {
        self.lower_limit
    }

    pub fn upper_limit(&self) -> u8 {
        self.upper_limit
    }

    pub fn step_size(&self) -> u8 {
        self.step_size
    }

    /// Wartezeit zwischen zwei Kanal-Schritten
    pub fn fade_time(&self) -> Duration {
        self.fade_time
    }

    /// Prüft die Grenzen, bevor ein Worker gestartet wird
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lower_limit >= self.upper_limit {
            return Err(ConfigError::InvalidBounds {
                lower: self.lower_limit,
                upper: self.upper_limit,
            });
        }
        Ok(())
    }

    /// Ein Schritt eines Farbkanals
    ///
    /// Bewegt den Kanal um `direction * step` und begrenzt ihn. Erreicht der
    /// Kanal eine Grenze, wird er gehalten (`step = 0`) und trägt ab dann den
    /// Hand-off: `DECR` unten, `INCR` oben.
    ///
    /// Die obere Grenze greift bereits ab `upper_limit - lower_limit`.
    /// Bei großem `lower_limit` endet eine Rampe dadurch einige Schritte früher.
    ///
    /// Gibt den Duty-Cycle zurück, der auf den Pin geschrieben wird.
    pub fn adjust(&self, channel: &mut ChannelState, direction: i8) -> u8 {
        let lower = i16::from(self.lower_limit);
        let upper = i16::from(self.upper_limit);

        channel.value += i16::from(direction) * channel.step;

        if channel.value < lower {
            channel.value = lower;
            channel.step = 0;
            channel.hand_off = DECR;
        }

        if channel.value > upper - lower {
            channel.value = upper;
            channel.step = 0;
            channel.hand_off = INCR;
        }

        channel.duty()
    }
}

fn clamp_pwm(value: i32) -> u8 {
    value.clamp(i32::from(PWM_MIN), i32::from(PWM_MAX)) as u8
}

/// Zustand eines Farbkanals während eines Fades
///
/// Gehört exklusiv dem Worker, der den Streifen faded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelState {
    /// Aktueller Duty-Cycle
    pub value: i16,
    /// `+step_size`, `-step_size` oder `0` (gehalten)
    pub step: i16,
    /// Faktor für den Schritt des nächsten Kanals, `0` solange nichts weitergegeben wird
    pub hand_off: i8,
}

impl ChannelState {
    pub const fn new(value: u8, step: i16, hand_off: i8) -> Self {
        Self {
            value: value as i16,
            step,
            hand_off,
        }
    }

    pub fn is_held(&self) -> bool {
        self.step == 0
    }

    pub fn duty(&self) -> u8 {
        clamp_pwm(i32::from(self.value))
    }
}

/// Farbverlauf eines Streifens: drei gekoppelte Kanäle
///
/// Der Hand-off eines Kanals treibt den nächsten Kanal (Rot → Grün → Blau → Rot).
/// Genau ein Kanal trägt zu jedem Zeitpunkt einen Hand-off. Erreicht der
/// getriebene Kanal eine Grenze, verbraucht er den Hand-off seines Vorgängers
/// und gibt seinen eigenen weiter. Ein gehaltener Kanal startet mit
/// `-step_size`, läuft also entgegen der empfangenen Richtung: so entsteht
/// die Folge Grün ab, Blau auf, Rot ab, Grün auf, Blau ab, Rot auf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeCycle {
    channels: [ChannelState; 3],
}

impl FadeCycle {
    /// Startzustand aus der aktuellen Farbe des Streifens
    ///
    /// Rot gibt "dimmen" an Grün weiter, Grün läuft bereits, Blau wird gehalten.
    pub fn seed(current: RGB8, settings: &FadeSettings) -> Self {
        let step = i16::from(settings.step_size());
        Self {
            channels: [
                ChannelState::new(current.r, 0, DECR),
                ChannelState::new(current.g, step, 0),
                ChannelState::new(current.b, 0, 0),
            ],
        }
    }

    pub fn channel(&self, channel: Channel) -> &ChannelState {
        &self.channels[channel.index()]
    }

    /// Aktuelle Farbe aus den drei Kanälen
    pub fn color(&self) -> RGB8 {
        RGB8 {
            r: self.channel(Channel::Red).duty(),
            g: self.channel(Channel::Green).duty(),
            b: self.channel(Channel::Blue).duty(),
        }
    }

    /// Lässt `driver` den nächsten Kanal verstellen
    ///
    /// Gibt den verstellten Kanal und seinen neuen Duty-Cycle zurück, oder
    /// `None` wenn `driver` gerade keinen Hand-off trägt.
    pub fn advance(&mut self, driver: Channel, settings: &FadeSettings) -> Option<(Channel, u8)> {
        let direction = self.channels[driver.index()].hand_off;
        if direction == 0 {
            return None;
        }

        let target = driver.next();
        let channel = &mut self.channels[target.index()];
        if channel.is_held() {
            channel.step = -i16::from(settings.step_size());
        }

        let duty = settings.adjust(channel, direction);
        if channel.hand_off != 0 {
            // Grenze erreicht: Hand-off geht an den nächsten Kanal über
            self.channels[driver.index()].hand_off = 0;
        }

        Some((target, duty))
    }
}

/// Extrahiert den Streifen-Namen aus einem Formularfeld `irgendwas[name]`
///
/// Alles außerhalb der ersten eckigen Klammern wird ignoriert.
pub fn light_name_from_field(field: &str) -> Option<&str> {
    let start = field.find('[')? + 1;
    let len = field[start..].find(']')?;
    let name = &field[start..start + len];
    (!name.is_empty()).then_some(name)
}

/// Sammelt die Streifen-Namen aus allen Formularfeldern (ohne Duplikate)
pub fn resolve_lights<'a>(fields: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut lights = Vec::new();
    for name in fields.into_iter().filter_map(light_name_from_field) {
        if !lights.contains(&name) {
            lights.push(name);
        }
    }
    lights
}
