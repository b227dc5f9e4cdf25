// Licensed under the Apache-2.0 license

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// A oneshot timer that executes a callback after a specified duration.
pub struct Timer {
    cancel_tx: Option<mpsc::Sender<()>>,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Creates a new `Timer` instance.
    ///
    /// The timer starts in an idle state and must be scheduled using `schedule()`.
    ///
    /// # Returns
    /// A new instance of `Timer`.
    pub fn new() -> Self {
        Self { cancel_tx: None }
    }

    /// Schedules a callback to be executed after the specified duration.
    ///
    /// If a timer is already running, it is **cancelled** before scheduling a new one.
    ///
    /// # Parameters
    /// - `duration`: The duration after which the callback should be executed.
    /// - `context`: Shared data passed to the callback.
    /// - `callback`: A function that executes when the timer fires.
    pub fn schedule<F, G>(&mut self, duration: Duration, context: G, callback: F)
    where
        F: FnOnce(G) + Send + 'static,
        G: Send + 'static,
    {
        // Cancel any running timer before scheduling a new one
        self.cancel();

        let (tx, rx) = mpsc::channel();
        self.cancel_tx = Some(tx);

        thread::spawn(move || {
            let result = rx.recv_timeout(duration);
            if result.is_err() {
                // Timer expired, execute callback
                callback(context);
            }
            // Otherwise, the timer was cancelled
            // and we do nothing.
        });
    }

    /// Cancels the currently running timer, if any.
    /// This prevents the scheduled callback from executing.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(()); // Send cancel signal
        }
    }
}
