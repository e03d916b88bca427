//! Signal handling for evaluation runs
//!
//! The first SIGINT requests a cooperative stop: the run finishes the
//! in-flight scenario, starts nothing new and the session ends `cancelled`.
//! SIGTERM stops the same way but leaves the session `paused`. Any further
//! signal forces the shutdown and cancels the in-flight turn.

use futures::stream::StreamExt;
use gauntlet_eval::CancelHandle;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use tokio::task::JoinHandle;

/// Signal handler bound to one run
pub struct SignalHandler {
    task_handle: Option<JoinHandle<()>>,
    signals_handle: Option<signal_hook_tokio::Handle>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            task_handle: None,
            signals_handle: None,
        }
    }

    /// Start translating SIGINT and SIGTERM into cancellation of `cancel`
    pub fn start(&mut self, cancel: CancelHandle) -> std::io::Result<()> {
        if self.task_handle.is_some() {
            return Ok(());
        }

        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        self.signals_handle = Some(signals.handle());

        let handle = tokio::spawn(async move {
            while let Some(signal) = signals.next().await {
                if cancel.is_requested() {
                    eprintln!("\n🛑 Aborting the in-flight turn...");
                    cancel.force();
                    break;
                }
                match signal {
                    SIGTERM => {
                        eprintln!("\n⏸  Pausing after the current scenario");
                        cancel.pause();
                    }
                    SIGINT => {
                        eprintln!("\n⏸  Stopping after the current scenario (Ctrl+C again to abort now)");
                        cancel.request();
                    }
                    _ => {}
                }
            }
        });

        self.task_handle = Some(handle);
        Ok(())
    }

    /// Stop listening for signals
    pub fn stop(&mut self) {
        if let Some(handle) = self.signals_handle.take() {
            handle.close();
        }
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SignalHandler {
    fn drop(&mut self) {
        self.stop();
    }
}
