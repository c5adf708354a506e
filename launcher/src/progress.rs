//! Download progress cell.

use tokio::sync::watch;

/// Progress value once a download has finished or failed.
pub const TERMINATED: f64 = -1.0;

/// Fraction of a download received, observable through [`watch`] receivers.
///
/// Holds a value in `0.0..=1.0` while the download runs and [`TERMINATED`]
/// once it ends. Dropped receivers simply stop observing.
#[derive(Debug)]
pub struct Progress {
    tx: watch::Sender<f64>,
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0.0);
        Self { tx }
    }

    /// Publishes a new fraction, clamped to `0.0..=1.0`.
    pub fn set(&self, fraction: f64) {
        self.tx.send_replace(fraction.clamp(0.0, 1.0));
    }

    /// Publishes `received / total`. Unknown totals leave the value alone.
    pub fn update(&self, received: u64, total: Option<u64>) {
        if let Some(total) = total.filter(|&total| total > 0) {
            #[allow(clippy::cast_precision_loss)]
            self.set(received as f64 / total as f64);
        }
    }

    pub fn terminate(&self) {
        self.tx.send_replace(TERMINATED);
    }

    pub fn get(&self) -> f64 {
        *self.tx.borrow()
    }

    pub fn is_terminated(&self) -> bool {
        self.get() < 0.0
    }

    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.tx.subscribe()
    }
}
