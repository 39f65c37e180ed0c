//! Single-slot mailbox shared between the core and a host-side thread.
//!
//! Each direction is one value cell plus a `full` flag. The producer only
//! writes the cell while the slot is empty and publishes it with a release
//! store; the consumer observes `full` with an acquire load before reading.
//! Neither side ever waits, so a slow host cannot stall the core: an `OUT`
//! into a full slot is counted as dropped instead.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::soc::device::{Device, DeviceAccess};

#[derive(Default)]
struct Slot {
    value: AtomicU64,
    full: AtomicBool,
}

impl Slot {
    fn offer(&self, value: u64) -> bool {
        if self.full.load(Ordering::Acquire) {
            return false;
        }
        self.value.store(value, Ordering::Relaxed);
        self.full.store(true, Ordering::Release);
        true
    }

    fn take(&self) -> Option<u64> {
        if !self.full.load(Ordering::Acquire) {
            return None;
        }
        let value = self.value.load(Ordering::Relaxed);
        self.full.store(false, Ordering::Release);
        Some(value)
    }
}

#[derive(Default)]
struct Shared {
    outbound: Slot,
    inbound: Slot,
    dropped: AtomicU64,
}

/// Core-side half, registered in the device table.
pub struct Mailbox {
    name: String,
    shared: Arc<Shared>,
}

/// Host-side half, usable from any thread.
#[derive(Clone)]
pub struct MailboxHost {
    shared: Arc<Shared>,
}

impl Mailbox {
    pub fn new(name: impl Into<String>) -> (Self, MailboxHost) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                name: name.into(),
                shared: shared.clone(),
            },
            MailboxHost { shared },
        )
    }
}

impl MailboxHost {
    /// Takes the value the core last sent with `OUT`, if any.
    pub fn try_recv(&self) -> Option<u64> {
        self.shared.outbound.take()
    }

    /// Offers a value for the core's next `IN`. Returns false while the
    /// previous value has not been consumed.
    pub fn post(&self, value: u64) -> bool {
        self.shared.inbound.offer(value)
    }

    /// `OUT` transactions lost because the host had not drained the slot.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl Device for Mailbox {
    fn name(&self) -> &str {
        &self.name
    }

    fn set(&mut self, value: u64, access: DeviceAccess) {
        if !self.shared.outbound.offer(value) {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(id = access.id, "mailbox full, dropping value");
        }
    }

    fn enable(&mut self, _access: DeviceAccess) -> Option<u64> {
        self.shared.inbound.take()
    }
}
