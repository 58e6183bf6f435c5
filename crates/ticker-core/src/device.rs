//! Device-level control.

/// Whole-device operations.
pub trait Device: Send + Sync {
    /// Restart the device.
    ///
    /// On hardware this does not return. Host implementations may return
    /// after recording or scheduling the restart.
    fn restart(&self);
}

impl<D: Device + ?Sized> Device for std::sync::Arc<D> {
    fn restart(&self) {
        (**self).restart()
    }
}
