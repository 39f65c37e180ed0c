//! Boundary to the host's system-call implementations.
//!
//! The core only resolves an id and stores whatever 64-bit value comes back in
//! `A`. Arguments travel in fixed registers by convention.
use ahash::AHashMap;

use crate::soc::core::register::{RegisterId, View};
use crate::soc::core::state::MachineState;

/// Registers carrying syscall arguments, in order.
pub const SYSCALL_ARGUMENTS: [RegisterId; 3] = [RegisterId::B, RegisterId::C, RegisterId::D];

/// Result returned for an id nobody registered.
pub const UNHANDLED_SYSCALL: u64 = u64::MAX;

pub trait SyscallGateway: Send {
    fn call(&mut self, id: u8, machine: &mut MachineState) -> u64;
}

pub type SyscallHandler = Box<dyn FnMut(&mut MachineState) -> u64 + Send>;

/// Dispatch table of host handlers keyed by syscall id.
#[derive(Default)]
pub struct SyscallTable {
    handlers: AHashMap<u8, SyscallHandler>,
}

impl SyscallTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handler` for `id`, returning the handler it replaced.
    pub fn register<F>(&mut self, id: u8, handler: F) -> Option<SyscallHandler>
    where
        F: FnMut(&mut MachineState) -> u64 + Send + 'static,
    {
        self.handlers.insert(id, Box::new(handler))
    }

    pub fn contains(&self, id: u8) -> bool {
        self.handlers.contains_key(&id)
    }
}

impl SyscallGateway for SyscallTable {
    fn call(&mut self, id: u8, machine: &mut MachineState) -> u64 {
        match self.handlers.get_mut(&id) {
            Some(handler) => handler(machine),
            None => {
                tracing::warn!(id, "unhandled syscall");
                UNHANDLED_SYSCALL
            }
        }
    }
}

impl MachineState {
    /// Values of the syscall argument registers.
    pub fn syscall_args(&self) -> [u64; 3] {
        SYSCALL_ARGUMENTS.map(|register| self.registers.read(register, View::Full))
    }
}
