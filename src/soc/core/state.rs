use crate::soc::core::flags::Flags;
use crate::soc::core::register::{RegisterFile, RegisterId, View, Width};
use crate::soc::device::DeviceTable;
use crate::soc::memory::Memory;

/// View of `PC` holding the program counter.
pub const PC_VIEW: View = View::Quarter0;
/// View of `SP` holding the stack pointer.
pub const SP_VIEW: View = View::Quarter0;

pub const DEFAULT_STACK_TOP: u64 = 0x0010_0000;

/// Reset-time parameters of a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreConfig {
    pub entry: u64,
    pub stack_top: u64,
    pub load_address: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            entry: 0,
            stack_top: DEFAULT_STACK_TOP,
            load_address: 0,
        }
    }
}

impl CoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, entry: u64) -> Self {
        self.entry = entry;
        self
    }

    pub fn stack_top(mut self, stack_top: u64) -> Self {
        self.stack_top = stack_top;
        self
    }

    pub fn load_address(mut self, load_address: u64) -> Self {
        self.load_address = load_address;
        self
    }
}

/// Everything one instruction step may touch: registers, memory and the
/// device table, owned together instead of living in process-wide globals.
#[derive(Debug, Default)]
pub struct MachineState {
    pub registers: RegisterFile,
    pub memory: Memory,
    pub devices: DeviceTable,
}

impl MachineState {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn pc(&self) -> u64 {
        self.registers.read(RegisterId::Pc, PC_VIEW)
    }

    #[inline(always)]
    pub fn set_pc(&mut self, value: u64) {
        self.registers.write(RegisterId::Pc, PC_VIEW, value);
    }

    #[inline(always)]
    pub fn advance_pc(&mut self, bytes: usize) {
        self.registers.increment(RegisterId::Pc, PC_VIEW, bytes as i64);
    }

    #[inline(always)]
    pub fn sp(&self) -> u64 {
        self.registers.read(RegisterId::Sp, SP_VIEW)
    }

    #[inline(always)]
    pub fn set_sp(&mut self, value: u64) {
        self.registers.write(RegisterId::Sp, SP_VIEW, value);
    }

    pub fn is_running(&self) -> bool {
        self.registers.flag(Flags::RUNNING)
    }

    /// Clears the running flag; the core powers off after the current step.
    pub fn request_halt(&mut self) {
        self.registers.set_flag(Flags::RUNNING, false);
    }

    /// Grows the stack downward by `width` bytes and stores `value` there.
    pub fn push(&mut self, width: Width, value: u64) {
        self.registers
            .decrement(RegisterId::Sp, SP_VIEW, width.bytes() as i64);
        let sp = self.sp();
        self.memory.write_sized(sp, width, value);
    }

    pub fn pop(&mut self, width: Width) -> u64 {
        let sp = self.sp();
        let value = self.memory.read_sized(sp, width);
        self.registers
            .increment(RegisterId::Sp, SP_VIEW, width.bytes() as i64);
        value
    }

    /// Clears registers and loads the configured entry point and stack top.
    /// Memory and devices are kept.
    pub fn reset(&mut self, config: &CoreConfig) {
        self.registers.clear();
        self.set_pc(config.entry);
        self.set_sp(config.stack_top);
    }
}
