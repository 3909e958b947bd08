// pilight Server - Web-Oberfläche für RGB LED-Streifen an mehreren Raspberry Pis

use std::sync::Arc;

use anyhow::Context;
use log::{info, warn};
use static_cell::StaticCell;
use tokio::net::TcpListener;

use pilight_core::{LightControl, PowerState, PwmController};
use pilight_server::AppState;
use pilight_server::config::{Settings, load_light_config};
use pilight_server::hal::PigpioController;
use pilight_server::tasks::{TokioSpawner, http_server_task};

/// Main Entry Point
///
/// Lädt Konfiguration, baut den Licht-Kontext und startet den HTTP-Server.
/// Fade-Worker laufen auf dem Blocking-Pool von Tokio.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ist optional; Werte aus dem Environment haben Vorrang
    let dotenv = dotenvy::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!("CONFIG: ignoring .env: {}", e);
        }
    }

    let settings = Settings::from_env().context("invalid settings")?;
    let lights = load_light_config(settings.lights_file())?;
    if lights.is_empty() {
        warn!("CONFIG: no lights configured in {}", settings.lights_file().display());
    }

    // Ein Controller pro Adresse, alle Fade-Flags gelöscht
    let control = LightControl::from_config(&lights, settings.fade(), PigpioController::new)
        .context("invalid light configuration")?;

    // Erster Verbindungsaufbau blockiert bis zum Connect-Timeout
    tokio::task::block_in_place(|| {
        for (id, address) in control.registry().controller_addresses().enumerate() {
            let connected = control
                .controller(id)
                .is_some_and(PwmController::is_connected);
            info!(
                "PIGPIO: {} ({} lights) {}",
                address,
                control.registry().light_names(id).count(),
                if connected { "connected" } else { "unreachable" }
            );
        }
    });

    // Zustand muss 'static sein für die HTTP-Handler
    static STATE: StaticCell<AppState> = StaticCell::new();
    let state = &*STATE.init(AppState::new(Arc::new(control), TokioSpawner::current()));

    if settings.off_on_start() {
        info!("LIGHT: switching all lights off");
        tokio::task::block_in_place(|| state.control.set_all(PowerState::Off));
    }

    let listener = TcpListener::bind(settings.http_addr())
        .await
        .with_context(|| format!("cannot bind {}", settings.http_addr()))?;
    info!("HTTP: Listening on http://{}", settings.http_addr());

    http_server_task(state, listener).await
}
