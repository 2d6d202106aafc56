//! Progress ticks for one extraction call.

use std::sync::atomic::{AtomicI16, Ordering};

use tokio::sync::mpsc;

/// Emits whole-percent ticks in `[0, 100]`, never going backwards.
///
/// A reporter lives for one extraction. Dropping the receiver unsubscribes;
/// reporting then becomes a no-op.
pub struct ProgressReporter {
    tx: Option<mpsc::UnboundedSender<u8>>,
    last: AtomicI16,
}

impl ProgressReporter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<u8>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Some(tx),
                last: AtomicI16::new(-1),
            },
            rx,
        )
    }

    /// A reporter nobody listens to.
    pub fn silent() -> Self {
        Self {
            tx: None,
            last: AtomicI16::new(-1),
        }
    }

    /// Report overall progress in percent. Values below the last tick are dropped.
    pub fn report(&self, percent: f32) {
        let value = if percent.is_finite() {
            percent.clamp(0.0, 100.0).round() as i16
        } else {
            return;
        };
        let previous = self.last.fetch_max(value, Ordering::AcqRel);
        if value > previous {
            if let Some(tx) = &self.tx {
                let _ = tx.send(value as u8);
            }
        }
    }

    pub fn finish(&self) {
        self.report(100.0);
    }

    /// Last emitted value, if any.
    pub fn current(&self) -> Option<u8> {
        let last = self.last.load(Ordering::Acquire);
        (last >= 0).then_some(last as u8)
    }
}
