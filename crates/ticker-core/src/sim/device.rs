use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::device::Device;

/// Counts restart requests instead of restarting.
#[derive(Debug, Clone, Default)]
pub struct RecordingDevice {
    restarts: Arc<AtomicUsize>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

impl Device for RecordingDevice {
    fn restart(&self) {
        info!("Restart requested");
        self.restarts.fetch_add(1, Ordering::SeqCst);
    }
}
