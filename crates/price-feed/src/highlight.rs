//! Transient highlight driven by a price subscription
//!
//! Knows nothing about the aggregator beyond the subscription it consumes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::subscription::PriceSubscription;

/// Active for `pulse` after each genuine change; a change while active
/// restarts the same pulse rather than stacking another one.
#[derive(Debug)]
pub struct Highlight {
    active_rx: watch::Receiver<bool>,
    triggers: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl Highlight {
    pub fn spawn(mut subscription: PriceSubscription, pulse: Duration) -> Self {
        // The value current at spawn time is not a change; anything after it is
        subscription.skip_current();
        let (active_tx, active_rx) = watch::channel(false);
        let triggers = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(drive(subscription, pulse, active_tx, Arc::clone(&triggers)));
        Self {
            active_rx,
            triggers,
            task,
        }
    }

    pub fn is_active(&self) -> bool {
        *self.active_rx.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<bool> {
        self.active_rx.clone()
    }

    /// Number of changes that started or restarted the pulse
    pub fn triggers(&self) -> u64 {
        self.triggers.load(Ordering::Relaxed)
    }
}

impl Drop for Highlight {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn drive(
    mut subscription: PriceSubscription,
    pulse: Duration,
    active_tx: watch::Sender<bool>,
    triggers: Arc<AtomicU64>,
) {
    let expiry = tokio::time::sleep(pulse);
    tokio::pin!(expiry);
    let mut active = false;

    loop {
        tokio::select! {
            changed = subscription.next() => {
                if changed.is_none() {
                    break;
                }
                expiry.as_mut().reset(Instant::now() + pulse);
                triggers.fetch_add(1, Ordering::Relaxed);
                if !active {
                    active = true;
                    active_tx.send_replace(true);
                }
            }
            () = &mut expiry, if active => {
                active = false;
                active_tx.send_replace(false);
            }
        }
    }

    active_tx.send_replace(false);
}
