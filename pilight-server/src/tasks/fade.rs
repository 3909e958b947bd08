// Fade Tasks - startet Fade-Worker auf der Tokio Runtime

use pilight_core::{FadeTask, TaskSpawner};
use tokio::runtime::Handle;

/// Startet jeden Fade-Worker auf einem eigenen Thread des Blocking-Pools
///
/// Worker schreiben synchron auf den pigpio Socket. Auf dem Blocking-Pool
/// hält das weder die HTTP-Verbindungen noch andere Worker auf. Der Thread
/// treibt den Worker mit `Handle::block_on`, bis sein Fade-Flag gelöscht ist.
#[derive(Debug, Clone)]
pub struct TokioSpawner {
    handle: Handle,
}

impl TokioSpawner {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Spawner für die Runtime, in der der Aufrufer läuft
    ///
    /// Panikt außerhalb einer Tokio Runtime (wie `Handle::current`).
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl TaskSpawner for TokioSpawner {
    fn spawn(&self, task: FadeTask) {
        let handle = self.handle.clone();
        // JoinHandle wird verworfen: Worker beenden sich über ihr Fade-Flag
        drop(self.handle.spawn_blocking(move || handle.block_on(task)));
    }
}
