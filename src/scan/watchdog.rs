//! Wall-clock limit for a whole run.
//!
//! Evaluation cannot be interrupted inside a criterion (hashing a large
//! file runs to completion), so the watchdog ends the process instead.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Exit status used when the timeout fires
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Background timer; dropping it disarms the timer
pub struct Watchdog {
    disarmed: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Terminate the process once `timeout` has elapsed
    pub fn arm(timeout: Duration) -> Self {
        Self::with_action(timeout, move || {
            tracing::error!("timed out after {} ms", timeout.as_millis());
            std::process::exit(TIMEOUT_EXIT_CODE);
        })
    }

    /// Run `action` once `timeout` has elapsed, unless disarmed first
    pub fn with_action(timeout: Duration, action: impl FnOnce() + Send + 'static) -> Self {
        let disarmed = Arc::new((Mutex::new(false), Condvar::new()));
        let flag = Arc::clone(&disarmed);
        let handle = thread::spawn(move || {
            let (lock, cvar) = &*flag;
            let deadline = Instant::now() + timeout;
            let Ok(mut done) = lock.lock() else {
                return;
            };
            while !*done {
                let now = Instant::now();
                if now >= deadline {
                    drop(done);
                    action();
                    return;
                }
                done = match cvar.wait_timeout(done, deadline - now) {
                    Ok((guard, _)) => guard,
                    Err(_) => return,
                };
            }
        });
        Self {
            disarmed,
            handle: Some(handle),
        }
    }

    pub fn disarm(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let (lock, cvar) = &*self.disarmed;
        if let Ok(mut done) = lock.lock() {
            *done = true;
            cvar.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}
