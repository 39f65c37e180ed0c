use std::sync::{Arc, Mutex};

use crate::soc::device::{Device, DeviceAccess};

/// Register-like device that keeps the last value written and hands it back
/// on `IN`. Every write is also appended to a history shared with
/// [`LatchProbe`] so the host can inspect it after a run.
pub struct Latch {
    name: String,
    value: u64,
    history: Arc<Mutex<Vec<u64>>>,
}

#[derive(Clone)]
pub struct LatchProbe {
    history: Arc<Mutex<Vec<u64>>>,
}

impl Latch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: 0,
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Starts with `value` already latched so `IN` can read it before any `OUT`.
    pub fn with_value(name: impl Into<String>, value: u64) -> Self {
        let mut latch = Self::new(name);
        latch.value = value;
        latch
    }

    pub fn probe(&self) -> LatchProbe {
        LatchProbe {
            history: self.history.clone(),
        }
    }
}

impl LatchProbe {
    pub fn history(&self) -> Vec<u64> {
        match self.history.lock() {
            Ok(history) => history.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn last(&self) -> Option<u64> {
        self.history().last().copied()
    }
}

impl Device for Latch {
    fn name(&self) -> &str {
        &self.name
    }

    fn set(&mut self, value: u64, _access: DeviceAccess) {
        self.value = value;
        match self.history.lock() {
            Ok(mut history) => history.push(value),
            Err(poisoned) => poisoned.into_inner().push(value),
        }
    }

    fn enable(&mut self, _access: DeviceAccess) -> Option<u64> {
        Some(self.value)
    }
}
