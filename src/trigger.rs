//! Edge-triggered "play audio now" request.
//!
//! Set from an interrupt or signal handler, consumed by the notifier on its
//! next tick. Clones share the same flag.
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

#[derive(Debug, Clone, Default)]
pub struct ManualTrigger {
    requested: Arc<AtomicBool>,
}

impl ManualTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request playback. Repeated presses before the next tick collapse into one.
    pub fn fire(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Consume a pending request, returning whether there was one.
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }

    pub fn is_pending(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
