//! Graceful interruption.
//!
//! A run must stop cleanly between provider calls: every single call is
//! safe to repeat on the next run (descriptions de-duplicate creation, the
//! source tag records attempted copies), but a half-finished sequence of
//! calls for one snapshot should not be abandoned mid-way.
//!
//! # Behaviour
//! - First SIGINT/SIGTERM/SIGHUP: set the [`CancelFlag`]; workers finish the
//!   entity they are on and stop picking up new ones
//! - Second signal: exit immediately with `128 + signal`

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared "stop soon" flag checked by the coordinator between entities
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Install signal handlers that trip `flag`.
///
/// Spawns one listener thread for the lifetime of the process.
pub fn init_signal_handlers(flag: &CancelFlag) -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;
    use std::thread;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
    let flag = flag.clone();

    thread::spawn(move || {
        for sig in signals.forever() {
            let signal_name = match sig {
                SIGINT => "SIGINT",
                SIGTERM => "SIGTERM",
                SIGHUP => "SIGHUP",
                _ => "UNKNOWN",
            };

            if flag.is_cancelled() {
                tracing::warn!("Received {} again, exiting immediately", signal_name);
                std::process::exit(128 + sig);
            }

            tracing::warn!(
                "Received {}, finishing in-flight operations (send again to force exit)",
                signal_name
            );
            flag.cancel();
        }
    });

    Ok(())
}
