//! Per-instrument subscriptions onto the published snapshots

use futures::Stream;
use std::sync::Arc;
use tokio::sync::watch;

use tracker_core::{CoreError, CoreResult, PriceState, RankedSnapshot, Symbol};

/// Current value of one symbol's price state, then each genuine change.
///
/// Consecutive equal states are never yielded. Snapshots published faster
/// than the subscriber reads are coalesced, so it always sees the latest state.
#[derive(Debug)]
pub struct PriceSubscription {
    symbol: Symbol,
    rx: watch::Receiver<Arc<RankedSnapshot>>,
    last: Option<Arc<PriceState>>,
}

impl PriceSubscription {
    pub fn new(symbol: &str, mut rx: watch::Receiver<Arc<RankedSnapshot>>) -> CoreResult<Self> {
        if rx.borrow().get(symbol).is_none() {
            return Err(CoreError::UnknownSymbol(Symbol::new(symbol)));
        }
        // Replay the current value on the first call to `next`
        rx.mark_changed();
        Ok(Self {
            symbol: Symbol::new(symbol),
            rx,
            last: None,
        })
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Last state yielded by this subscription
    pub fn last(&self) -> Option<&Arc<PriceState>> {
        self.last.as_ref()
    }

    /// Take the current state as already seen, so `next` waits for a change.
    pub fn skip_current(&mut self) -> Option<Arc<PriceState>> {
        let state = Arc::clone(self.rx.borrow_and_update().state_of(self.symbol.as_str())?);
        self.last = Some(Arc::clone(&state));
        Some(state)
    }

    /// Wait for the next distinct state. `None` once the aggregator is gone.
    ///
    /// Cancel-safe.
    pub async fn next(&mut self) -> Option<Arc<PriceState>> {
        loop {
            self.rx.changed().await.ok()?;

            let state = Arc::clone(self.rx.borrow_and_update().state_of(self.symbol.as_str())?);
            if self.last.as_deref() == Some(&*state) {
                continue;
            }
            self.last = Some(Arc::clone(&state));
            return Some(state);
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Arc<PriceState>> + Send {
        futures::stream::unfold(self, |mut sub| async move {
            let state = sub.next().await?;
            Some((state, sub))
        })
    }
}
