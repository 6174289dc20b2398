use dashmap::DashSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// Single-slot in-flight flag: at most one submission holds it at a time.
#[derive(Debug, Default)]
pub struct InFlight {
    busy: AtomicBool,
}

/// Releases the [`InFlight`] slot on drop, including on early return or
/// when the owning future is cancelled.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when another submission is still pending.
    pub fn try_acquire(&self) -> Option<InFlightGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard { flag: &self.busy })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// In-flight flags keyed by a string, for workflows shared across browsers.
#[derive(Debug, Default)]
pub struct KeyedInFlight {
    pending: DashSet<String>,
}

/// Releases one key of a [`KeyedInFlight`] on drop.
#[derive(Debug)]
pub struct KeyedInFlightGuard<'a> {
    pending: &'a DashSet<String>,
    key: String,
}

impl KeyedInFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when a submission for `key` is still pending.
    pub fn try_acquire(&self, key: &str) -> Option<KeyedInFlightGuard<'_>> {
        self.pending
            .insert(key.to_string())
            .then(|| KeyedInFlightGuard {
                pending: &self.pending,
                key: key.to_string(),
            })
    }

    pub fn is_busy(&self, key: &str) -> bool {
        self.pending.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Drop for KeyedInFlightGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.key);
    }
}
