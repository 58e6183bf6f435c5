//! In-memory implementations of every platform capability.
//!
//! Used by the unit and scenario tests and by the Linux simulator. All
//! types are cheap handles over shared state: clone one, move the clone
//! into the code under test, and inspect the original afterwards.

mod device;
mod display;
mod http;
mod network;
mod store;
mod time;

pub use device::RecordingDevice;
pub use display::{DisplayOp, RecordingDisplay};
pub use http::{CannedHttp, SimServer};
pub use network::{NetworkCall, SimNetwork, SimScenario};
pub use store::MemoryStore;
pub use time::ManualClock;

use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
