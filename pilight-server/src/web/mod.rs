// Web-Modul: Oberfläche und WebSocket-Protokoll

pub mod protocol;

// HTML-Datei zur Compile-Zeit einbinden
// Die Streifen-Liste kommt nach dem Verbindungsaufbau über den WebSocket
pub const INDEX_HTML: &str = include_str!("index.html");
