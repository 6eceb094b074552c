//! Background worker plumbing shared by the scanners

use std::sync::mpsc::SyncSender;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use shapefile_format::{Result, ShapefileError};

/// Lifecycle of a scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Header not read yet
    Unopened,
    /// Header decoded, scan not started
    HeaderRead,
    /// Background worker running
    Scanning,
    /// Stream exhausted without error
    Done,
    /// Header or record decoding failed
    Errored,
}

/// First-error-wins slot written by a worker and read by its consumer.
#[derive(Debug, Clone, Default)]
pub(crate) struct ErrorSlot(Arc<Mutex<Option<ShapefileError>>>);

impl ErrorSlot {
    /// Record `err` unless an earlier error is already stored.
    pub(crate) fn set(&self, err: ShapefileError) {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(err);
        }
    }

    pub(crate) fn get(&self) -> Option<ShapefileError> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn is_set(&self) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Spawn a named worker feeding `tx`.
///
/// An error returned by `work` is stored in `slot` before `tx` is dropped, so
/// a consumer that sees the channel close can rely on the slot being final.
pub(crate) fn spawn_worker<T, F>(
    name: &str,
    slot: ErrorSlot,
    tx: SyncSender<T>,
    work: F,
) -> Result<JoinHandle<()>>
where
    T: Send + 'static,
    F: FnOnce(&SyncSender<T>) -> Result<()> + Send + 'static,
{
    let thread_name = name.to_string();
    let handle = thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            tracing::trace!(worker = %thread_name, "worker started");
            match work(&tx) {
                Ok(()) => tracing::trace!(worker = %thread_name, "worker finished"),
                Err(err) => {
                    tracing::debug!(worker = %thread_name, error = %err, "worker failed");
                    slot.set(err);
                }
            }
            drop(tx);
        })?;
    Ok(handle)
}

/// Send one item, returning false if the consumer has gone away.
pub(crate) fn hand_off<T>(tx: &SyncSender<T>, item: T) -> bool {
    tx.send(item).is_ok()
}

/// Join a finished worker, turning a panic into an error in `slot`.
pub(crate) fn join_worker(handle: JoinHandle<()>, slot: &ErrorSlot) {
    let name = handle.thread().name().unwrap_or("worker").to_string();
    if handle.join().is_err() {
        slot.set(ShapefileError::Internal(format!("{} thread panicked", name)));
    }
}
