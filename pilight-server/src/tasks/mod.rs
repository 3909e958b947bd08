// Task-Modul: HTTP-Server und Fade-Worker
//
// Der HTTP-Server läuft in einem LocalSet (picoserve Futures sind nicht Send),
// die Fade-Worker auf dem Multi-Thread-Scheduler.

pub mod fade;
pub mod http;

// Re-export Tasks für einfachen Import
pub use fade::TokioSpawner;
pub use http::http_server_task;
