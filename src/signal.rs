//! Signal-triggered cancellation.
//!
//! # Design Notes
//! - Handlers are installed with `sigaction` and `SA_RESTART`: interrupted
//!   syscalls resume instead of surfacing spurious `EINTR` failures, and
//!   handler semantics stay consistent across platforms (legacy `signal()`
//!   guarantees neither).
//! - The handler body is async-signal-safe: it only stores into atomics.
//!   A watcher thread turns the flag into a `CancelSource` fire, since
//!   channel and mutex work cannot happen inside the handler.
//! - SIGINT, SIGTERM, and SIGABRT all map to the same clean-exit path.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::thread;
use std::time::Duration;

use crate::cancel::CancelSource;

static SIGNAL_SEEN: AtomicBool = AtomicBool::new(false);
static SIGNAL_NUM: AtomicI32 = AtomicI32::new(0);

const WATCH_INTERVAL: Duration = Duration::from_millis(50);

extern "C" fn handle_signal(signum: libc::c_int) {
    SIGNAL_NUM.store(signum, Ordering::SeqCst);
    SIGNAL_SEEN.store(true, Ordering::SeqCst);
}

/// Install handlers and start the watcher that fires `source` when a
/// signal arrives. The watcher is a daemon thread; it ends with the
/// process or when cancellation fires for any reason.
pub fn install(source: CancelSource) {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handle_signal as libc::sighandler_t;
        action.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut action.sa_mask);
        for signum in [libc::SIGINT, libc::SIGTERM, libc::SIGABRT] {
            libc::sigaction(signum, &action, std::ptr::null_mut());
        }
    }

    thread::spawn(move || loop {
        if SIGNAL_SEEN.load(Ordering::SeqCst) {
            eprintln!("received signal {}, exiting", signal_name());
            source.cancel();
            return;
        }
        if source.is_cancelled() {
            return;
        }
        thread::sleep(WATCH_INTERVAL);
    });
}

/// Whether a handled signal has been observed this run. The driver uses
/// this to distinguish a clean signal exit from other cancellations.
pub fn triggered() -> bool {
    SIGNAL_SEEN.load(Ordering::SeqCst)
}

fn signal_name() -> &'static str {
    match SIGNAL_NUM.load(Ordering::SeqCst) {
        libc::SIGINT => "SIGINT",
        libc::SIGTERM => "SIGTERM",
        libc::SIGABRT => "SIGABRT",
        _ => "signal",
    }
}
