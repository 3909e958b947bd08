// pigpio Controller - PWM über den pigpio Daemon Socket
//
// Jeder Raspberry Pi mit LED-Streifen betreibt `pigpiod`. Der Server spricht
// das Socket-Protokoll direkt: 16 Byte Request (cmd, p1, p2, p3) und 16 Byte
// Response, deren letztes Wort das Ergebnis ist (negativ = Fehler).

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{info, warn};
use pilight_core::{ControllerError, Pin, PwmController};

use crate::config::{
    PIGPIO_CONNECT_TIMEOUT_MS, PIGPIO_IO_TIMEOUT_MS, PIGPIO_PORT, PIGPIO_RECONNECT_DELAY_SECS,
};

/// pigpio Kommando: PWM Duty-Cycle setzen
const CMD_PWM: u32 = 5;

/// pigpio Kommando: PWM Duty-Cycle lesen
const CMD_GDC: u32 = 83;

/// Größe von Request und Response in Bytes
const FRAME_SIZE: usize = 16;

/// Kodiert einen pigpio Request (4 × u32 little-endian)
pub fn encode_request(cmd: u32, p1: u32, p2: u32) -> [u8; FRAME_SIZE] {
    let mut frame = [0u8; FRAME_SIZE];
    frame[0..4].copy_from_slice(&cmd.to_le_bytes());
    frame[4..8].copy_from_slice(&p1.to_le_bytes());
    frame[8..12].copy_from_slice(&p2.to_le_bytes());
    // p3 = Länge der Extension, hier immer 0
    frame
}

/// Liest das Ergebnis-Wort einer pigpio Response
pub fn decode_response(frame: &[u8; FRAME_SIZE]) -> i32 {
    i32::from_le_bytes([frame[12], frame[13], frame[14], frame[15]])
}

/// Ergänzt den pigpio Standard-Port, falls die Adresse keinen enthält
pub fn endpoint(address: &str) -> String {
    if address.contains(':') {
        address.to_string()
    } else {
        format!("{address}:{PIGPIO_PORT}")
    }
}

#[derive(Default)]
struct Connection {
    stream: Option<TcpStream>,
    last_attempt: Option<Instant>,
}

/// PWM-Controller hinter einem pigpio Daemon
///
/// Die Verbindung wird erst bei Bedarf aufgebaut. Nach einem Fehler wird sie
/// verworfen; [`is_connected`](PwmController::is_connected) versucht höchstens
/// alle `PIGPIO_RECONNECT_DELAY_SECS` einen neuen Aufbau.
pub struct PigpioController {
    address: String,
    connection: Mutex<Connection>,
}

impl PigpioController {
    /// Erstellt einen Controller für `host` oder `host:port`
    pub fn new(address: &str) -> Self {
        Self {
            address: endpoint(address),
            connection: Mutex::new(Connection::default()),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ControllerError> {
        self.connection.lock().map_err(|_| ControllerError::Io)
    }

    fn connect(&self) -> std::io::Result<TcpStream> {
        let timeout = Duration::from_millis(PIGPIO_CONNECT_TIMEOUT_MS);
        let mut last_error = None;

        for addr in self.address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    let io_timeout = Some(Duration::from_millis(PIGPIO_IO_TIMEOUT_MS));
                    stream.set_read_timeout(io_timeout)?;
                    stream.set_write_timeout(io_timeout)?;
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no address resolved")
        }))
    }

    /// Schickt ein Kommando und liefert das Ergebnis-Wort
    fn command(&self, cmd: u32, p1: u32, p2: u32) -> Result<u32, ControllerError> {
        let mut connection = self.lock()?;
        let stream = connection
            .stream
            .as_mut()
            .ok_or(ControllerError::Unreachable)?;

        let mut response = [0u8; FRAME_SIZE];
        let exchange = stream
            .write_all(&encode_request(cmd, p1, p2))
            .and_then(|()| stream.read_exact(&mut response));

        if let Err(e) = exchange {
            warn!("PIGPIO: {} connection lost: {}", self.address, e);
            connection.stream = None;
            return Err(ControllerError::Io);
        }

        let result = decode_response(&response);
        u32::try_from(result).map_err(|_| ControllerError::Rejected(result))
    }
}

impl PwmController for PigpioController {
    fn set_duty_cycle(&self, pin: Pin, value: u8) -> Result<(), ControllerError> {
        self.command(CMD_PWM, u32::from(pin), u32::from(value))
            .map(|_| ())
    }

    fn duty_cycle(&self, pin: Pin) -> Result<u8, ControllerError> {
        let value = self.command(CMD_GDC, u32::from(pin), 0)?;
        Ok(u8::try_from(value).unwrap_or(u8::MAX))
    }

    fn is_connected(&self) -> bool {
        let Ok(mut connection) = self.lock() else {
            return false;
        };
        if connection.stream.is_some() {
            return true;
        }

        let delay = Duration::from_secs(PIGPIO_RECONNECT_DELAY_SECS);
        if connection
            .last_attempt
            .is_some_and(|attempt| attempt.elapsed() < delay)
        {
            return false;
        }

        connection.last_attempt = Some(Instant::now());
        match self.connect() {
            Ok(stream) => {
                info!("PIGPIO: connected to {}", self.address);
                connection.stream = Some(stream);
                true
            }
            Err(e) => {
                warn!("PIGPIO: {} unreachable: {}", self.address, e);
                false
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
