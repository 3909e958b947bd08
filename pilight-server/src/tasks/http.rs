// HTTP Server Task - Serviert HTML und WebSocket
use core::future::pending;
use std::rc::Rc;
use std::time::Duration;

use embassy_futures::select::{Either, select};
use log::{debug, info, warn};
use picoserve::{io::embedded_io_async, response::IntoResponse, response::ws, routing::get};
use serde::Serialize;
use tokio::net::TcpListener;

use crate::config::{HTTP_BUFFER_SIZE, STATUS_SUBSCRIBERS, WEBSOCKET_BUFFER_SIZE};
use crate::web::{
    INDEX_HTML,
    protocol::{StatusUpdate, WsClientMessage, WsServerMessage},
};
use crate::{AppState, StatusSubscriber};

/// Response-Enum für WebSocket-Endpoint
/// Ermöglicht Rückgabe von entweder WebSocket-Upgrade oder HTTP-Fehler
enum WebSocketResponse {
    Upgrade(
        ws::UpgradedWebSocket<ws::UnspecifiedProtocol, ws::CallbackNotUsingState<WebSocketHandler>>,
    ),
    ServiceUnavailable,
}

impl IntoResponse for WebSocketResponse {
    async fn write_to<
        R: embedded_io_async::Read,
        W: picoserve::response::ResponseWriter<Error = R::Error>,
    >(
        self,
        connection: picoserve::response::Connection<'_, R>,
        response_writer: W,
    ) -> Result<picoserve::ResponseSent, W::Error> {
        match self {
            WebSocketResponse::Upgrade(ws) => ws.write_to(connection, response_writer).await,
            WebSocketResponse::ServiceUnavailable => {
                picoserve::response::Response::new(
                    picoserve::response::StatusCode::new(503),
                    "Service Unavailable: Too many WebSocket connections",
                )
                .with_header("Retry-After", "5")
                .write_to(connection, response_writer)
                .await
            }
        }
    }
}

/// HTTP Server Task
///
/// - Serviert index.html auf GET /
/// - WebSocket-Endpoint auf /ws für Kommandos und Status-Updates
///
/// Jede Verbindung läuft als eigener lokaler Task; Kommandos greifen direkt
/// auf den gemeinsamen [`AppState`] zu.
pub async fn http_server_task(
    state: &'static AppState,
    listener: TcpListener,
) -> anyhow::Result<()> {
    // Router-Konfiguration
    let app = Rc::new(picoserve::Router::new().route("/", get(serve_html)).route(
        "/ws",
        get(
            move |upgrade: picoserve::response::WebSocketUpgrade| async move {
                debug!("HTTP: WebSocket upgrade requested");

                // Ein Subscriber pro Verbindung. Sind alle Slots belegt,
                // bekommt der Client HTTP 503 statt eines Panics.
                match state.status.subscriber() {
                    Ok(status_subscriber) => {
                        let handler = WebSocketHandler {
                            state,
                            status_subscriber,
                        };
                        WebSocketResponse::Upgrade(upgrade.on_upgrade(handler))
                    }
                    Err(_) => {
                        warn!(
                            "HTTP: No subscriber slots available ({}/{} in use), sending HTTP 503",
                            STATUS_SUBSCRIBERS, STATUS_SUBSCRIBERS
                        );
                        WebSocketResponse::ServiceUnavailable
                    }
                }
            },
        ),
    ));

    // Server-Konfiguration
    let config = Rc::new(picoserve::Config::new(picoserve::Timeouts {
        start_read_request: Some(Duration::from_secs(5)),
        read_request: Some(Duration::from_secs(1)),
        write: Some(Duration::from_secs(1)),
        persistent_start_read_request: Some(Duration::from_secs(5)),
    })
    .keep_connection_alive());

    // picoserve Futures sind nicht Send → alle Verbindungen im LocalSet
    tokio::task::LocalSet::new()
        .run_until(async {
            loop {
                let (stream, remote_address) = listener.accept().await?;
                debug!("HTTP: Connection from {}", remote_address);

                let app = Rc::clone(&app);
                let config = Rc::clone(&config);

                tokio::task::spawn_local(async move {
                    let mut http_buffer = [0u8; HTTP_BUFFER_SIZE];
                    match picoserve::Server::new(&*app, &*config, &mut http_buffer)
                        .serve(stream)
                        .await
                    {
                        Ok(picoserve::DisconnectionInfo {
                            handled_requests_count,
                            ..
                        }) => debug!(
                            "HTTP: {} requests handled from {}",
                            handled_requests_count, remote_address
                        ),
                        Err(err) => warn!("HTTP: Connection {} failed: {:?}", remote_address, err),
                    }
                });
            }
        })
        .await
}

/// Serviert die HTML-Hauptseite
async fn serve_html() -> impl IntoResponse {
    picoserve::response::Response::new(picoserve::response::StatusCode::OK, INDEX_HTML)
        .with_header("Content-Type", "text/html; charset=utf-8")
}

/// WebSocket-Handler State
struct WebSocketHandler {
    state: &'static AppState,
    status_subscriber: StatusSubscriber,
}

impl ws::WebSocketCallback for WebSocketHandler {
    async fn run<R: embedded_io_async::Read, W: embedded_io_async::Write<Error = R::Error>>(
        mut self,
        mut rx: ws::SocketRx<R>,
        mut tx: ws::SocketTx<W>,
    ) -> Result<(), W::Error> {
        info!("HTTP: WebSocket connection established");

        // Buffer für eingehende WebSocket-Nachrichten
        let mut buffer = [0u8; WEBSOCKET_BUFFER_SIZE];

        // Seitenaufbau: Streifen-Liste und aktueller Fade-Zustand
        Self::send_json(&mut tx, &self.state.lights_message()).await?;
        Self::send_json(&mut tx, &self.state.status(None).as_message()).await?;

        let close_reason = loop {
            // Gleichzeitig auf Browser-Nachrichten und Status-Broadcasts warten
            match select(
                rx.next_message(&mut buffer, pending()),
                self.status_subscriber.next_message_pure(),
            )
            .await
            {
                Either::First(ws_result) => {
                    let ws_result = ws_result?.ignore_never_b();

                    match ws_result {
                        Ok(ws::Message::Text(data)) => {
                            debug!("HTTP: Received text message: {} bytes", data.len());
                            Self::handle_text(self.state, &mut tx, data).await?;
                        }
                        Ok(ws::Message::Binary(data)) => {
                            debug!(
                                "HTTP: Received binary message: {} bytes (ignored)",
                                data.len()
                            );
                        }
                        Ok(ws::Message::Ping(data)) => {
                            tx.send_pong(data).await?;
                        }
                        Ok(ws::Message::Pong(_)) => {}
                        Ok(ws::Message::Close(_reason)) => {
                            debug!("HTTP: WebSocket close received");
                            break None;
                        }
                        Err(error) => {
                            warn!("HTTP: WebSocket error");
                            break Some((error.code(), "WebSocket Error"));
                        }
                    }
                }
                // Status-Update nach einem Kommando (von irgendeinem Client)
                Either::Second(update) => {
                    Self::send_status(&mut tx, &update).await?;
                }
            }
        };

        info!("HTTP: WebSocket connection closed");
        tx.close(close_reason).await
    }
}

impl WebSocketHandler {
    /// Führt ein Kommando aus und verteilt den neuen Zustand an alle Clients
    async fn handle_text<W: embedded_io_async::Write>(
        state: &'static AppState,
        tx: &mut ws::SocketTx<W>,
        data: &str,
    ) -> Result<(), W::Error> {
        let message = match serde_json::from_str::<WsClientMessage>(data) {
            Ok(message) => message,
            Err(e) => {
                warn!("HTTP: JSON parse error: {}", e);
                return Self::send_error(tx, "JSON parse error").await;
            }
        };

        match state.execute(message).await {
            Ok(report) => {
                state.broadcast(state.status(Some(&report)));
                Ok(())
            }
            Err(reason) => {
                warn!("HTTP: Rejected command: {}", reason);
                Self::send_error(tx, reason).await
            }
        }
    }

    async fn send_status<W: embedded_io_async::Write>(
        tx: &mut ws::SocketTx<W>,
        update: &StatusUpdate,
    ) -> Result<(), W::Error> {
        Self::send_json(tx, &update.as_message()).await
    }

    async fn send_error<W: embedded_io_async::Write>(
        tx: &mut ws::SocketTx<W>,
        message: &str,
    ) -> Result<(), W::Error> {
        Self::send_json(tx, &WsServerMessage::Error { message }).await
    }

    /// Serialisiert und sendet eine Nachricht als Text-Frame
    async fn send_json<W: embedded_io_async::Write>(
        tx: &mut ws::SocketTx<W>,
        message: &impl Serialize,
    ) -> Result<(), W::Error> {
        match serde_json::to_string(message) {
            Ok(json) => tx.send_text(&json).await,
            Err(e) => {
                warn!("HTTP: Serialization failed: {}", e);
                Ok(())
            }
        }
    }
}
