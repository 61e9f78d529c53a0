use std::sync::{Arc, Mutex};

/// Mutex-guarded cancellation request owned by one service instance.
///
/// The lock covers only the read-modify-write of the flag, never the network call.
#[derive(Debug, Default)]
pub(crate) struct CancelFlag {
    requested: Mutex<bool>,
}

impl CancelFlag {
    pub(crate) fn request(&self) {
        match self.requested.lock() {
            Ok(mut guard) => *guard = true,
            Err(poisoned) => *poisoned.into_inner() = true,
        }
    }

    /// Returns whether cancellation was requested, clearing the request.
    pub(crate) fn take(&self) -> bool {
        let mut guard = match self.requested.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, false)
    }
}

/// Cloneable handle that requests cancellation of the owning service's current call.
///
/// Cancellation is cooperative: it is observed right before dispatch and right
/// after the transport returns. An in-flight HTTP request is not aborted; its
/// response is discarded.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<CancelFlag>,
}

impl CancelHandle {
    pub(crate) fn new(flag: Arc<CancelFlag>) -> Self {
        Self { flag }
    }

    pub fn cancel(&self) {
        self.flag.request();
    }
}
