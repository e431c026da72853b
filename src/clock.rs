//! Phase deadlines.
//!
//! Each session actor owns one `PhaseClock`. Arming it for a `(phase, day)`
//! replaces whatever timer was running; when the sleep finishes the clock
//! posts `ClockElapsed` back into the actor's own queue, so a timeout is
//! handled exactly like any other command.

use crate::types::{GameConfig, Phase};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Deadline trigger for the phase it was armed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockElapsed {
    pub phase: Phase,
    pub day: u32,
}

pub struct PhaseClock<T> {
    config: GameConfig,
    /// Weak so a pending timer never keeps a dropped actor alive
    notify: mpsc::WeakSender<T>,
    timer: Option<JoinHandle<()>>,
    armed: Option<ClockElapsed>,
}

impl<T> PhaseClock<T>
where
    T: From<ClockElapsed> + Send + 'static,
{
    pub fn new(config: GameConfig, notify: mpsc::WeakSender<T>) -> Self {
        Self {
            config,
            notify,
            timer: None,
            armed: None,
        }
    }

    /// Arm the deadline for `(phase, day)`, replacing any running timer
    pub fn start(&mut self, phase: Phase, day: u32) {
        self.stop();

        let duration = self.config.phase_duration(phase);
        let notify = self.notify.clone();
        let epoch = ClockElapsed { phase, day };

        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(tx) = notify.upgrade() {
                // Actor may have shut down in the meantime; nothing to do then
                let _ = tx.send(T::from(epoch)).await;
            }
        }));
        self.armed = Some(epoch);
        tracing::debug!(?phase, day, secs = duration.as_secs(), "Phase clock armed");
    }

    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.armed = None;
    }

    /// The epoch the running timer will report, if any
    pub fn armed(&self) -> Option<ClockElapsed> {
        self.armed
    }
}

impl<T> Drop for PhaseClock<T> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
