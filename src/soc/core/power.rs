//! Power lifecycle gate and the dedicated worker thread that owns a core.
//!
//! Only the power state crosses threads. Registers, memory and devices stay
//! on the worker, which parks on the gate until powered on, runs to `HALT`
//! (or a fault) and parks again.
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::soc::core::cpu::Core;
use crate::soc::core::syscall::SyscallGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Off,
    On,
    Shutdown,
}

#[derive(Debug)]
pub struct PowerGate {
    state: Mutex<PowerState>,
    signal: Condvar,
}

impl Default for PowerGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PowerState::Off),
            signal: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PowerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> PowerState {
        *self.lock()
    }

    /// Returns false once the gate has been shut down.
    pub fn power_on(&self) -> bool {
        let mut state = self.lock();
        if *state == PowerState::Shutdown {
            return false;
        }
        *state = PowerState::On;
        self.signal.notify_all();
        true
    }

    pub fn power_off(&self) {
        let mut state = self.lock();
        if *state == PowerState::On {
            *state = PowerState::Off;
            self.signal.notify_all();
        }
    }

    pub fn shutdown(&self) {
        let mut state = self.lock();
        *state = PowerState::Shutdown;
        self.signal.notify_all();
    }

    /// Parks while powered off. Returns true when powered on, false on
    /// shutdown.
    pub fn wait_for_power(&self) -> bool {
        let guard = self.lock();
        let guard = self
            .signal
            .wait_while(guard, |state| *state == PowerState::Off)
            .unwrap_or_else(PoisonError::into_inner);
        *guard == PowerState::On
    }

    /// Parks while powered on and returns the state that ended the wait.
    pub fn wait_for_halt(&self) -> PowerState {
        let guard = self.lock();
        let guard = self
            .signal
            .wait_while(guard, |state| *state == PowerState::On)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// A core running on its own thread behind a [`PowerGate`].
pub struct CoreWorker<S: SyscallGateway + 'static> {
    gate: Arc<PowerGate>,
    handle: JoinHandle<Core<S>>,
}

impl<S: SyscallGateway + 'static> CoreWorker<S> {
    pub fn spawn(mut core: Core<S>) -> Self {
        let gate = core.power().clone();
        let handle = thread::spawn(move || {
            while core.power().wait_for_power() {
                core.start();
                match core.run() {
                    Ok(summary) => tracing::debug!(
                        steps = summary.steps,
                        pc = summary.pc,
                        "core halted"
                    ),
                    Err(err) => tracing::error!("core stopped on fault: {err}"),
                }
            }
            tracing::debug!("core worker shut down");
            core
        });
        Self { gate, handle }
    }

    pub fn gate(&self) -> &Arc<PowerGate> {
        &self.gate
    }

    pub fn power_on(&self) -> bool {
        self.gate.power_on()
    }

    pub fn wait_for_halt(&self) -> PowerState {
        self.gate.wait_for_halt()
    }

    /// Stops the worker once the current run ends and hands the core back.
    pub fn shutdown(self) -> thread::Result<Core<S>> {
        self.gate.wait_for_halt();
        self.gate.shutdown();
        self.handle.join()
    }
}
