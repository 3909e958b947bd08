//! Fade State Set
//!
//! Ein Fade-Flag pro Streifen, beim Start einmal angelegt. Die Flags sind
//! atomar; Worker prüfen sie vor jedem Schreibzugriff und beenden sich, sobald
//! ihr Flag gelöscht ist.
//!
//! Zusätzlich merkt sich jeder Eintrag, ob gerade ein Worker für den Streifen
//! läuft. Nur wer diese Registrierung bekommt, darf einen Worker starten.
//!
//! Schreibzugriffe auf die Pins eines Streifens laufen unter einer kurzen
//! Sperre ([`FadeFlags::lock_pins`]). Ein Worker prüft sein Flag erst, nachdem
//! er die Sperre hat; wer das Flag löscht und danach schreibt, wird also nie
//! von einem Fade-Wert überschrieben.

use alloc::collections::BTreeMap;
use alloc::string::String;
use core::hint;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::error::LightError;

#[derive(Debug, Default)]
struct FadeSlot {
    enabled: AtomicBool,
    worker: AtomicBool,
    generation: AtomicU32,
    pins: AtomicBool,
}

/// Hält die Pin-Sperre eines Streifens bis zum Drop
#[must_use]
#[derive(Debug)]
pub struct PinGuard<'a> {
    lock: &'a AtomicBool,
}

impl Drop for PinGuard<'_> {
    fn drop(&mut self) {
        self.lock.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
pub struct FadeFlags {
    slots: BTreeMap<String, FadeSlot>,
}

impl FadeFlags {
    /// Legt für jeden Namen ein gelöschtes Flag an
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            slots: names
                .into_iter()
                .map(|name| (String::from(name), FadeSlot::default()))
                .collect(),
        }
    }

    fn slot(&self, name: &str) -> Result<&FadeSlot, LightError> {
        self.slots
            .get(name)
            .ok_or_else(|| LightError::UnknownLight(name.into()))
    }

    /// Setzt das Flag; ein laufender Worker macht weiter
    pub fn enable(&self, name: &str) -> Result<(), LightError> {
        self.slot(name)?.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Löscht das Flag; der Worker beendet sich vor seinem nächsten Schreibzugriff
    pub fn disable(&self, name: &str) -> Result<(), LightError> {
        self.slot(name)?.enabled.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Löscht alle Flags (vor "alle an" / "alle aus")
    pub fn disable_all(&self) {
        for slot in self.slots.values() {
            slot.enabled.store(false, Ordering::SeqCst);
        }
    }

    /// Unbekannte Namen faden nie
    pub fn is_enabled(&self, name: &str) -> bool {
        self.slot(name)
            .map(|slot| slot.enabled.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Namen aller Streifen mit gesetztem Flag
    pub fn fading(&self) -> impl Iterator<Item = &str> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.enabled.load(Ordering::SeqCst))
            .map(|(name, _)| name.as_str())
    }

    /// Registriert einen Worker für den Streifen
    ///
    /// Gibt `true` zurück, wenn der Aufrufer den Worker starten darf. Die
    /// Registrierung bleibt bestehen, bis der Worker [`release_worker`](Self::release_worker) aufruft.
    pub fn claim_worker(&self, name: &str) -> bool {
        self.slot(name).is_ok_and(|slot| {
            slot.worker
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        })
    }

    /// Vom Worker nach seinem letzten Schreibzugriff aufgerufen
    pub fn release_worker(&self, name: &str) {
        if let Ok(slot) = self.slot(name) {
            slot.worker.store(false, Ordering::SeqCst);
        }
    }

    pub fn has_worker(&self, name: &str) -> bool {
        self.slot(name)
            .map(|slot| slot.worker.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Fordert einen laufenden Worker auf, mit der aktuellen Farbe neu zu beginnen
    pub fn request_restart(&self, name: &str) {
        if let Ok(slot) = self.slot(name) {
            slot.generation.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Sperrt die Pins des Streifens für einen Schreibvorgang
    ///
    /// Wartet aktiv, bis ein anderer Schreiber fertig ist. Gehalten wird die
    /// Sperre nur für die Dauer von höchstens drei Duty-Cycle-Writes, nie über
    /// ein `await` hinweg.
    pub fn lock_pins(&self, name: &str) -> Result<PinGuard<'_>, LightError> {
        let slot = self.slot(name)?;
        while slot
            .pins
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            hint::spin_loop();
        }
        Ok(PinGuard { lock: &slot.pins })
    }

    /// Zähler, der bei jedem Neustart-Wunsch erhöht wird
    pub fn generation(&self, name: &str) -> u32 {
        self.slot(name)
            .map(|slot| slot.generation.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}
