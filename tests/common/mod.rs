#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use softcore::soc::core::{Core, CoreConfig, ExecutionTracer, TraceEvent};

/// Core with `program` at address zero and the running flag raised.
pub fn boot(program: &[u8]) -> Core {
    boot_at(CoreConfig::default(), program)
}

pub fn boot_at(config: CoreConfig, program: &[u8]) -> Core {
    let mut core = Core::new(config);
    softcore::loader::load_bytes(core.memory_mut(), config.load_address, program);
    core.power_on();
    core
}

/// Tracer that stores every event for inspection after a run.
#[derive(Clone, Default)]
pub struct RecordingTracer {
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl RecordingTracer {
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().expect("trace lock").clone()
    }
}

impl ExecutionTracer for RecordingTracer {
    fn on_event(&mut self, event: TraceEvent) {
        self.events.lock().expect("trace lock").push(event);
    }
}
