//! Abstraktions-Traits
//!
//! Diese Traits definieren die Schnittstellen zum PWM-Controller und zur
//! Laufzeit, ohne konkrete Implementierung.

use alloc::boxed::Box;
use core::fmt;
use core::future::Future;
use core::pin::Pin as PinnedBox;

use crate::types::Pin;

/// Fehler-Typ für Controller-Operationen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerError {
    /// Controller ist nicht verbunden, Operation wurde übersprungen
    Unreachable,
    /// Verbindung während der Operation abgebrochen
    Io,
    /// Controller hat mit einem Fehlercode geantwortet
    Rejected(i32),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::Unreachable => f.write_str("controller unreachable"),
            ControllerError::Io => f.write_str("controller connection failed"),
            ControllerError::Rejected(code) => write!(f, "controller rejected request ({code})"),
        }
    }
}

impl core::error::Error for ControllerError {}

/// Trait für PWM-Controller-Zugriff
///
/// Abstrahiert einen PWM-fähigen GPIO-Controller (lokal oder im Netzwerk).
/// Ein Handle wird von allen Fade-Workern und dem direkten Setzen geteilt,
/// daher `&self` und `Sync`.
///
/// # Implementierungen
/// - **Production:** `PigpioController` (pigpio Daemon Socket)
/// - **Testing:** `MockController` (in-memory Mock)
pub trait PwmController: Send + Sync {
    /// Setzt den Duty-Cycle eines Pins (0-255)
    fn set_duty_cycle(&self, pin: Pin, value: u8) -> Result<(), ControllerError>;

    /// Liest den aktuellen Duty-Cycle eines Pins (0-255)
    fn duty_cycle(&self, pin: Pin) -> Result<u8, ControllerError>;

    /// Ist der Controller gerade erreichbar?
    fn is_connected(&self) -> bool;
}

impl<C: PwmController + ?Sized> PwmController for alloc::sync::Arc<C> {
    fn set_duty_cycle(&self, pin: Pin, value: u8) -> Result<(), ControllerError> {
        (**self).set_duty_cycle(pin, value)
    }

    fn duty_cycle(&self, pin: Pin) -> Result<u8, ControllerError> {
        (**self).duty_cycle(pin)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

/// Ein Fade-Worker als eigenständiger Task
pub type FadeTask = PinnedBox<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Trait für das Starten von Fade-Workern
///
/// Der Core kennt keine Laufzeit; der Server startet Tasks auf tokio,
/// Tests können eigene Spawner verwenden.
pub trait TaskSpawner {
    /// Startet `task` im Hintergrund (fire-and-forget)
    fn spawn(&self, task: FadeTask);
}
