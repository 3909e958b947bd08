//! pilight Core - Lichtsteuerung ohne I/O
//!
//! Diese Crate enthält KEINE Netzwerk- oder Hardware-Zugriffe.
//! Sie definiert Traits, die Fade-Logik und den `LightControl`-Kontext.

#![no_std]

extern crate alloc;

pub mod config;
pub mod control;
pub mod error;
pub mod fade;
pub mod logic;
pub mod registry;
pub mod traits;
pub mod types;

// Re-exports für einfachen Zugriff
pub use config::LightConfig;
pub use control::{BatchReport, LightControl};
pub use error::{ConfigError, LightError};
pub use fade::{FadeFlags, PinGuard};
pub use logic::{ChannelState, FadeCycle, FadeSettings, light_name_from_field, resolve_lights};
pub use registry::LightRegistry;
pub use traits::{ControllerError, FadeTask, PwmController, TaskSpawner};
pub use types::{Channel, ControlAction, ControllerId, LightStrip, Pin, PinTriple, PowerState};
