use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Routes interrupts (Ctrl+C) for the whole session: the running command gets
/// cancelled, and an interrupt with nothing running ends the session.
#[derive(Debug, Default)]
pub struct InterruptRegistry {
    active: Mutex<Option<CancellationToken>>,
    shutdown: CancellationToken,
}

impl InterruptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh token for the command about to run.
    pub fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut slot) = self.active.lock() {
            *slot = Some(token.clone());
        }
        token
    }

    /// The command is done; later interrupts fall through to shutdown.
    pub fn finish(&self) {
        if let Ok(mut slot) = self.active.lock() {
            slot.take();
        }
    }

    /// Returns true when the interrupt ended the session.
    pub fn interrupt(&self) -> bool {
        let current = self.active.lock().ok().and_then(|mut slot| slot.take());
        match current {
            Some(token) => {
                debug!("Interrupt cancels the running command");
                token.cancel();
                false
            }
            None => {
                info!("Interrupt at idle prompt, shutting down");
                self.shutdown.cancel();
                true
            }
        }
    }

    pub fn shutdown(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}
