//! Defines the `Device` trait the core talks to from `OUT`/`IN`. A device is a
//! register-like sink/source for one 64-bit transaction per instruction; the
//! core calls it synchronously, so implementations must never block.

/// Context of one `OUT`/`IN` transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceAccess {
    pub id: u16,
    /// Width in bytes of the register view taking part in the transfer.
    pub width: usize,
    /// Address of the instruction performing the transfer.
    pub address: u64,
}

pub trait Device: Send {
    fn name(&self) -> &str;

    /// Receives the value written by `OUT`.
    fn set(&mut self, value: u64, access: DeviceAccess);

    /// Yields a value for `IN`. Write-only devices keep the default.
    fn enable(&mut self, _access: DeviceAccess) -> Option<u64> {
        None
    }
}
