//! Cancellable named timers owned by the conversation controller.
//!
//! Replaces scattered fire-and-forget timers: every armed timer is held in
//! one registry keyed by purpose, re-arming cancels the previous instance,
//! and teardown clears everything.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What a timer is for. One live timer per key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Typing-stop debounce: fires after the compose box goes quiet.
    TypingStop,
}

pub struct TimerRegistry {
    handles: HashMap<TimerKey, JoinHandle<()>>,
    fired_tx: mpsc::UnboundedSender<TimerKey>,
}

impl TimerRegistry {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerKey>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        (
            Self {
                handles: HashMap::new(),
                fired_tx,
            },
            fired_rx,
        )
    }

    /// Arm (or re-arm) a timer. An existing timer under the same key is
    /// cancelled first.
    pub fn arm(&mut self, key: TimerKey, delay: Duration) {
        self.cancel(key);
        let fired_tx = self.fired_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = fired_tx.send(key);
        });
        self.handles.insert(key, handle);
    }

    pub fn cancel(&mut self, key: TimerKey) {
        if let Some(handle) = self.handles.remove(&key) {
            handle.abort();
        }
    }

    /// Cancel every pending timer. Called on conversation teardown.
    pub fn clear(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rearming_resets_the_clock() {
        let (mut timers, mut fired) = TimerRegistry::new();
        timers.arm(TimerKey::TypingStop, Duration::from_millis(40));
        tokio::time::sleep(Duration::from_millis(25)).await;
        // Re-arm before expiry; the original must not fire.
        timers.arm(TimerKey::TypingStop, Duration::from_millis(40));
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(fired.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(fired.try_recv().ok(), Some(TimerKey::TypingStop));
    }

    #[tokio::test]
    async fn clear_cancels_pending_timers() {
        let (mut timers, mut fired) = TimerRegistry::new();
        timers.arm(TimerKey::TypingStop, Duration::from_millis(20));
        timers.clear();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(fired.try_recv().is_err());
    }
}
