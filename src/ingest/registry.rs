//! Dynamic subscription registry: the set of alliance instances whose event
//! streams are being tracked.
//!
//! Registration is additive only and idempotent; there is no unregister.
//! The spawn function is injected so the registry's bookkeeping can be
//! exercised without a live websocket endpoint.

use std::collections::HashMap;

use alloy::primitives::Address;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct SubscriptionRegistry<S>
where
    S: FnMut(Address) -> JoinHandle<()>,
{
    tracked: HashMap<Address, JoinHandle<()>>,
    spawn: S,
}

impl<S> SubscriptionRegistry<S>
where
    S: FnMut(Address) -> JoinHandle<()>,
{
    pub fn new(spawn: S) -> Self {
        Self {
            tracked: HashMap::new(),
            spawn,
        }
    }

    /// Starts tracking an address. Returns `false` without spawning anything
    /// when the address is already tracked, so a replayed creation event can
    /// never produce duplicate delivery.
    pub fn register(&mut self, address: Address) -> bool {
        if self.tracked.contains_key(&address) {
            debug!(%address, "Alliance already tracked");
            return false;
        }

        let handle = (self.spawn)(address);
        self.tracked.insert(address, handle);
        true
    }

    pub fn is_tracked(&self, address: &Address) -> bool {
        self.tracked.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }
}

impl<S> Drop for SubscriptionRegistry<S>
where
    S: FnMut(Address) -> JoinHandle<()>,
{
    fn drop(&mut self) {
        for handle in self.tracked.values() {
            handle.abort();
        }
    }
}
