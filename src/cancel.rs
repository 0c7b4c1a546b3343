//! Level-triggered, idempotent cancellation handle.
//!
//! # Invariants
//! - Cancellation is one-way: once fired it stays fired.
//! - `is_cancelled` is a plain atomic load and safe to call on hot paths.
//! - Blocked channel operations observe cancellation promptly: the token
//!   carries a receiver whose sender is dropped on cancel, so a
//!   `crossbeam_channel::select!` arm on [`CancelToken::channel`] becomes
//!   ready the moment cancellation fires.
//!
//! # Design Notes
//! - The channel never carries a message; disconnection IS the signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{bounded, Receiver, Sender};

struct Inner {
    flag: AtomicBool,
    gate: Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
}

/// Owning side: fires cancellation. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct CancelSource {
    inner: Arc<Inner>,
}

/// Observing side handed to pipeline stages. Cheap to clone.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, rx) = bounded::<()>(0);
        CancelSource {
            inner: Arc::new(Inner {
                flag: AtomicBool::new(false),
                gate: Mutex::new(Some(tx)),
                rx,
            }),
        }
    }

    /// Fire cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        if let Ok(mut gate) = self.inner.gate.lock() {
            gate.take();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Receiver that disconnects when cancellation fires. Never yields a
    /// message; use it as a `select!` arm to unblock sends and receives.
    pub fn channel(&self) -> &Receiver<()> {
        &self.inner.rx
    }
}
