//! LightControl - der zentrale Kontext der Lichtsteuerung
//!
//! Bündelt Registry, Controller-Handles, Fade-Flags und Fade-Einstellungen in
//! einem Objekt, das beim Start einmal gebaut und dann per `Arc` mit den
//! Web-Handlern und allen Fade-Workern geteilt wird.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use embassy_time::Timer;
use log::{debug, error, info, warn};
use rgb::RGB8;

use crate::config::LightConfig;
use crate::error::{ConfigError, LightError};
use crate::fade::{FadeFlags, PinGuard};
use crate::logic::{FadeCycle, FadeSettings, resolve_lights};
use crate::registry::LightRegistry;
use crate::traits::{PwmController, TaskSpawner};
use crate::types::{Channel, ControlAction, ControllerId, Pin, PinTriple, PowerState};

/// Ergebnis einer Batch-Operation
///
/// Fehler einzelner Streifen brechen eine Anfrage nie ab; sie landen hier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Streifen, die verarbeitet wurden
    pub applied: Vec<String>,
    /// Übersprungene Streifen mit Grund
    pub skipped: Vec<LightError>,
}

impl BatchReport {
    fn skip(&mut self, error: LightError) {
        warn!("LIGHT: skipping: {}", error);
        self.skipped.push(error);
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

pub struct LightControl<C> {
    registry: LightRegistry,
    controllers: Vec<C>,
    fades: FadeFlags,
    settings: FadeSettings,
}

impl<C: PwmController> LightControl<C> {
    /// Erstellt den Kontext
    ///
    /// `controllers[i]` gehört zur i-ten Adresse der Registry. Alle Fade-Flags
    /// starten gelöscht.
    ///
    /// # Fehlerbehandlung
    /// - `ConfigError::InvalidBounds` wenn die Fade-Grenzen ungültig sind
    /// - `ConfigError::ControllerCount` wenn die Handles nicht zur Registry passen
    pub fn new(
        registry: LightRegistry,
        controllers: Vec<C>,
        settings: FadeSettings,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;

        if controllers.len() != registry.controller_count() {
            return Err(ConfigError::ControllerCount {
                expected: registry.controller_count(),
                found: controllers.len(),
            });
        }

        let fades = FadeFlags::new(registry.lights().map(|light| light.name.as_str()));

        Ok(Self {
            registry,
            controllers,
            fades,
            settings,
        })
    }

    /// Baut Registry und Kontext aus der Konfiguration
    ///
    /// `connect` erzeugt für jede Controller-Adresse ein Handle.
    pub fn from_config(
        config: &LightConfig,
        settings: FadeSettings,
        connect: impl FnMut(&str) -> C,
    ) -> Result<Self, ConfigError> {
        let registry = LightRegistry::from_config(config)?;
        let controllers = registry.controller_addresses().map(connect).collect();
        Self::new(registry, controllers, settings)
    }

    pub fn registry(&self) -> &LightRegistry {
        &self.registry
    }

    pub fn fades(&self) -> &FadeFlags {
        &self.fades
    }

    pub fn settings(&self) -> &FadeSettings {
        &self.settings
    }

    pub fn controller(&self, id: ControllerId) -> Option<&C> {
        self.controllers.get(id)
    }

    /// Controller-Handle des Streifens
    pub fn resolve_controller(&self, name: &str) -> Result<&C, LightError> {
        let id = self.registry.resolve_controller(name)?;
        Ok(&self.controllers[id])
    }

    /// Pins des Streifens in R,G,B-Reihenfolge
    pub fn resolve_pins(&self, name: &str) -> Result<PinTriple, LightError> {
        self.registry.resolve_pins(name)
    }

    /// Liest die aktuelle Farbe eines Streifens vom Controller
    pub fn current_color(&self, name: &str) -> Result<RGB8, LightError> {
        let controller = self.resolve_controller(name)?;
        if !controller.is_connected() {
            return Err(LightError::ControllerUnreachable(name.into()));
        }
        let pins = self.resolve_pins(name)?;
        Ok(self.read_color(controller, pins))
    }

    /// Setzt eine feste Farbe
    ///
    /// Beendet zuerst einen laufenden Fade des Streifens, dann werden die drei
    /// Duty-Cycles geschrieben.
    pub fn set_static_color<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
        color: RGB8,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for name in names {
            let (controller, pins, _pins_locked) = match self.take_over(name) {
                Ok(found) => found,
                Err(e) => {
                    report.skip(e);
                    continue;
                }
            };

            if !controller.is_connected() {
                report.skip(LightError::ControllerUnreachable(name.into()));
                continue;
            }

            info!(
                "LIGHT: '{}' → ({}, {}, {})",
                name, color.r, color.g, color.b
            );
            write_pin(controller, pins.red, color.r);
            write_pin(controller, pins.green, color.g);
            write_pin(controller, pins.blue, color.b);
            report.applied.push(name.into());
        }

        report
    }

    /// Schaltet alle Streifen aller Controller an oder aus
    ///
    /// Löscht vorher alle Fade-Flags. Nicht erreichbare Controller werden
    /// übersprungen.
    pub fn set_all(&self, state: PowerState) {
        self.fades.disable_all();

        for (id, (address, controller)) in self
            .registry
            .controller_addresses()
            .zip(&self.controllers)
            .enumerate()
        {
            if !controller.is_connected() {
                warn!("LIGHT: controller {} unreachable, skipping", address);
                continue;
            }

            for light in self.registry.lights_of(id) {
                let _pins_locked = match self.fades.lock_pins(&light.name) {
                    Ok(guard) => guard,
                    Err(e) => {
                        error!("LIGHT: {}", e);
                        continue;
                    }
                };
                debug!("LIGHT: '{}' → {:?}", light.name, state);
                for pin in light.pins.iter() {
                    write_pin(controller, pin, state.duty());
                }
            }
        }
    }

    /// Feste Farbe für die Streifen aus den Formularfeldern (`lights[name]`)
    pub fn set_lights<'a>(
        &self,
        color: RGB8,
        fields: impl IntoIterator<Item = &'a str>,
    ) -> BatchReport {
        self.set_static_color(resolve_lights(fields), color)
    }

    fn lookup(&self, name: &str) -> Result<(&C, PinTriple), LightError> {
        Ok((self.resolve_controller(name)?, self.resolve_pins(name)?))
    }

    /// Beendet den Fade des Streifens und sperrt seine Pins für den Aufrufer
    ///
    /// Ein Worker, der die Sperre danach bekommt, sieht das gelöschte Flag
    /// und schreibt nicht mehr.
    fn take_over(&self, name: &str) -> Result<(&C, PinTriple, PinGuard<'_>), LightError> {
        let (controller, pins) = self.lookup(name)?;
        self.fades.disable(name)?;
        let guard = self.fades.lock_pins(name)?;
        Ok((controller, pins, guard))
    }

    fn read_color(&self, controller: &C, pins: PinTriple) -> RGB8 {
        let read = |pin: Pin| match controller.duty_cycle(pin) {
            Ok(value) => value,
            Err(e) => {
                warn!("LIGHT: reading pin {} failed: {}", pin, e);
                self.settings.lower_limit()
            }
        };
        RGB8::new(read(pins.red), read(pins.green), read(pins.blue))
    }

    /// Aktuelle Farbe als Startpunkt eines Fades
    fn seed_color(&self, controller: &C, pins: PinTriple) -> RGB8 {
        if controller.is_connected() {
            self.read_color(controller, pins)
        } else {
            let lower = self.settings.lower_limit();
            RGB8::new(lower, lower, lower)
        }
    }

    /// Fade-Schleife eines Streifens
    ///
    /// Läuft, solange das Flag gesetzt ist. Vor jedem Schreibzugriff wird das
    /// Flag unter der Pin-Sperre erneut geprüft; ein gelöschtes Flag beendet
    /// die Schleife sofort, ein Neustart-Wunsch beginnt den Durchlauf neu.
    async fn fade_until_disabled(&self, name: &str) {
        let (controller, pins) = match self.lookup(name) {
            Ok(found) => found,
            Err(e) => {
                error!("FADE: {}", e);
                return;
            }
        };

        if let Err(e) = self.settings.validate() {
            error!("FADE: '{}' not started: {}", name, e);
            if let Err(e) = self.fades.disable(name) {
                error!("FADE: {}", e);
            }
            return;
        }

        let fade_time = self.settings.fade_time();
        let mut generation = self.fades.generation(name);
        let mut cycle = FadeCycle::seed(self.seed_color(controller, pins), &self.settings);

        'fade: while self.fades.is_enabled(name) {
            let current = self.fades.generation(name);
            if current != generation {
                info!("FADE: '{}' restarting from current color", name);
                generation = current;
                cycle = FadeCycle::seed(self.seed_color(controller, pins), &self.settings);
            }

            let mut stepped = false;
            for driver in Channel::ALL {
                let Some((channel, duty)) = cycle.advance(driver, &self.settings) else {
                    continue;
                };

                {
                    let _pins_locked = match self.fades.lock_pins(name) {
                        Ok(guard) => guard,
                        Err(e) => {
                            error!("FADE: {}", e);
                            return;
                        }
                    };
                    if !self.fades.is_enabled(name) {
                        break 'fade;
                    }
                    if self.fades.generation(name) != generation {
                        continue 'fade;
                    }
                    if controller.is_connected() {
                        write_pin(controller, pins.pin(channel), duty);
                    }
                }

                Timer::after(fade_time).await;
                stepped = true;
            }

            if !stepped {
                Timer::after(fade_time).await;
            }
        }
    }
}

impl<C: PwmController + 'static> LightControl<C> {
    /// Startet den Farbverlauf für die angegebenen Streifen
    ///
    /// Pro Streifen wird höchstens ein Worker gestartet. Läuft bereits einer,
    /// beginnt dieser mit der aktuellen Farbe neu. Unbekannte Namen werden
    /// übersprungen. Kehrt sofort zurück.
    pub fn start_fade<'a, S: TaskSpawner + ?Sized>(
        self: &Arc<Self>,
        names: impl IntoIterator<Item = &'a str>,
        spawner: &S,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for name in names {
            if let Err(e) = self.registry.light(name).and_then(|_| self.fades.enable(name)) {
                report.skip(e);
                continue;
            }

            if self.fades.claim_worker(name) {
                info!("FADE: starting worker for '{}'", name);
                spawner.spawn(Box::pin(Arc::clone(self).run_fade(String::from(name))));
            } else {
                debug!("FADE: worker for '{}' already running", name);
                self.fades.request_restart(name);
            }
            report.applied.push(name.into());
        }

        report
    }

    /// Button aus der Web-Oberfläche
    ///
    /// "on"/"off" schalten alles, "fade" startet den Verlauf für die
    /// Streifen aus den Formularfeldern. "fade" ohne Streifen tut nichts.
    pub fn control_button<'a, S: TaskSpawner + ?Sized>(
        self: &Arc<Self>,
        action: ControlAction,
        fields: impl IntoIterator<Item = &'a str>,
        spawner: &S,
    ) -> BatchReport {
        match action {
            ControlAction::On => {
                self.set_all(PowerState::On);
                BatchReport::default()
            }
            ControlAction::Off => {
                self.set_all(PowerState::Off);
                BatchReport::default()
            }
            ControlAction::Fade => {
                let lights = resolve_lights(fields);
                if lights.is_empty() {
                    debug!("FADE: no lights selected");
                    return BatchReport::default();
                }
                self.start_fade(lights, spawner)
            }
        }
    }

    /// Worker-Task eines Streifens
    ///
    /// Gibt die Registrierung erst nach dem letzten Schreibzugriff frei. Wurde
    /// der Streifen in der Zwischenzeit erneut aktiviert, übernimmt dieser
    /// Worker wieder.
    async fn run_fade(self: Arc<Self>, name: String) {
        loop {
            self.fade_until_disabled(&name).await;
            self.fades.release_worker(&name);

            if !(self.fades.is_enabled(&name) && self.fades.claim_worker(&name)) {
                break;
            }
            debug!("FADE: '{}' re-enabled while stopping, continuing", name);
        }
        info!("FADE: worker for '{}' stopped", name);
    }
}

fn write_pin<C: PwmController>(controller: &C, pin: Pin, value: u8) {
    if let Err(e) = controller.set_duty_cycle(pin, value) {
        warn!("LIGHT: writing pin {} failed: {}", pin, e);
    }
}
