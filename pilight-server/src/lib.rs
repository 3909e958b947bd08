// Library-Root: Server-Logik rund um pilight-core
//
// Der Binary-Teil (bin/main.rs) lädt nur die Konfiguration und startet den
// HTTP-Server; alles Testbare liegt hier.

// Module
pub mod config;
pub mod hal;
pub mod tasks;
pub mod web;

// Re-exports von pilight-core
pub use pilight_core::{BatchReport, ControlAction, LightControl, LightError, PowerState};

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pubsub::{ImmediatePublisher, PubSubChannel, Subscriber};
use log::{error, info};
use rgb::RGB8;

use crate::config::{STATUS_CHANNEL_CAPACITY, STATUS_SUBSCRIBERS};
use crate::hal::PigpioController;
use crate::tasks::TokioSpawner;
use crate::web::protocol::{ControllerInfo, StatusUpdate, WsClientMessage, WsServerMessage};

// ============================================================================
// Type-Aliase für Channel-Typen
// ============================================================================

/// PubSubChannel für Status-Broadcasts an alle WebSocket-Clients
/// - STATUS_CHANNEL_CAPACITY: Nachrichten im Queue
/// - STATUS_SUBSCRIBERS: maximale Anzahl WebSocket-Clients
/// - 1: Publisher (Broadcasts laufen über den ImmediatePublisher)
pub type StatusChannel =
    PubSubChannel<CriticalSectionRawMutex, StatusUpdate, STATUS_CHANNEL_CAPACITY, STATUS_SUBSCRIBERS, 1>;

/// Publisher für Status-Broadcasts, verdrängt bei vollem Queue die älteste Nachricht
pub type StatusPublisher<'a> = ImmediatePublisher<
    'a,
    CriticalSectionRawMutex,
    StatusUpdate,
    STATUS_CHANNEL_CAPACITY,
    STATUS_SUBSCRIBERS,
    1,
>;

/// Subscriber für Status-Broadcasts (einer pro WebSocket-Verbindung)
pub type StatusSubscriber = Subscriber<
    'static,
    CriticalSectionRawMutex,
    StatusUpdate,
    STATUS_CHANNEL_CAPACITY,
    STATUS_SUBSCRIBERS,
    1,
>;

// ============================================================================
// Anwendungs-Zustand
// ============================================================================

/// Gemeinsamer Zustand aller HTTP-Verbindungen
pub struct AppState {
    pub control: Arc<LightControl<PigpioController>>,
    pub spawner: TokioSpawner,
    pub status: StatusChannel,
}

impl AppState {
    pub fn new(control: Arc<LightControl<PigpioController>>, spawner: TokioSpawner) -> Self {
        Self {
            control,
            spawner,
            status: PubSubChannel::new(),
        }
    }

    /// Führt ein Kommando aus der Oberfläche aus
    ///
    /// Gibt den Bericht des Kommandos zurück oder eine Fehlermeldung für den
    /// Client, wenn das Kommando selbst ungültig ist.
    pub fn handle(&self, message: &WsClientMessage) -> Result<BatchReport, &'static str> {
        match message {
            WsClientMessage::SetLights {
                red, green, blue, ..
            } => {
                info!("HTTP: set_lights ({}, {}, {})", red, green, blue);
                Ok(self
                    .control
                    .set_lights(RGB8::new(*red, *green, *blue), message.fields()))
            }
            WsClientMessage::Control { id, .. } => {
                let action =
                    ControlAction::try_from(id.as_str()).map_err(|()| "unknown control id")?;
                info!("HTTP: control {:?}", action);
                Ok(self
                    .control
                    .control_button(action, message.fields(), &self.spawner))
            }
        }
    }

    /// Führt ein Kommando auf dem Blocking-Pool von Tokio aus
    ///
    /// Controller-I/O blockiert (Socket-Timeouts, Reconnect); die
    /// HTTP-Verbindungen laufen in der Zwischenzeit weiter.
    pub async fn execute(
        &'static self,
        message: WsClientMessage,
    ) -> Result<BatchReport, &'static str> {
        tokio::task::spawn_blocking(move || self.handle(&message))
            .await
            .unwrap_or_else(|e| {
                error!("HTTP: command failed: {}", e);
                Err("command failed")
            })
    }

    /// Aktueller Zustand, optional mit den übersprungenen Streifen eines Kommandos
    pub fn status(&self, report: Option<&BatchReport>) -> StatusUpdate {
        StatusUpdate {
            fading: self.control.fades().fading().map(String::from).collect(),
            skipped: report
                .map(|report| report.skipped.iter().map(ToString::to_string).collect())
                .unwrap_or_default(),
        }
    }

    /// Schickt den Zustand an alle verbundenen Clients
    pub fn broadcast(&self, update: StatusUpdate) {
        let publisher: StatusPublisher<'_> = self.status.immediate_publisher();
        publisher.publish_immediate(update);
    }

    /// Alle Controller mit ihren Streifen
    pub fn lights_message(&self) -> WsServerMessage<'_> {
        let registry = self.control.registry();
        WsServerMessage::Lights {
            controllers: registry
                .controller_addresses()
                .enumerate()
                .map(|(id, address)| ControllerInfo {
                    address,
                    lights: registry.light_names(id).collect(),
                })
                .collect(),
        }
    }
}
