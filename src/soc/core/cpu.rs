//! Fetch → decode → execute loop.
//!
//! Each step fetches the opcode and its descriptor bytes into `IR`, advances
//! `PC` past that header, then executes the operation. Immediate operands are
//! consumed from `PC` as they are resolved, so by the time an instruction
//! transfers control `PC` already points at the next instruction.
use std::sync::Arc;

use smallvec::SmallVec;

use crate::soc::core::alu::AluBundle;
use crate::soc::core::decode::{Descriptor, Header, Mode, Opcode, Operation};
use crate::soc::core::error::{CoreError, CoreResult, DecodeError};
use crate::soc::core::flags::Flags;
use crate::soc::core::power::PowerGate;
use crate::soc::core::register::{RegisterFile, RegisterId, View, Width};
use crate::soc::core::state::{CoreConfig, MachineState, PC_VIEW};
use crate::soc::core::syscall::{SyscallGateway, SyscallTable};
use crate::soc::core::trace::{ExecutionTracer, TraceEvent};
use crate::soc::device::{DeviceAccess, DeviceTable};
use crate::soc::memory::Memory;

/// Width of the device id operand of `OUT`/`IN` when read from memory.
const DEVICE_ID_WIDTH: Width = Width::Half;
/// Width of the syscall id operand of `SYS` when read from memory.
const SYSCALL_ID_WIDTH: Width = Width::Byte;
/// Width of a `PUSH` operand read from memory.
const PUSH_INDIRECT_WIDTH: Width = Width::Full;

/// Instruction stream address `offset` bytes past `pc`, wrapping like `PC` itself.
#[inline(always)]
fn pc_relative(pc: u64, offset: usize) -> u64 {
    pc.wrapping_add(offset as u64) & PC_VIEW.width().mask()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Halted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Steps executed by this call.
    pub steps: u64,
    pub pc: u64,
    /// False when a step limit ended the run before the core halted.
    pub halted: bool,
}

pub struct Core<S: SyscallGateway = SyscallTable> {
    machine: MachineState,
    syscalls: S,
    config: CoreConfig,
    power: Arc<PowerGate>,
    tracer: Option<Box<dyn ExecutionTracer>>,
    steps: u64,
    last_fault: Option<CoreError>,
}

impl Core<SyscallTable> {
    pub fn new(config: CoreConfig) -> Self {
        Self::with_syscalls(config, SyscallTable::new())
    }
}

impl<S: SyscallGateway> Core<S> {
    pub fn with_syscalls(config: CoreConfig, syscalls: S) -> Self {
        let mut machine = MachineState::new();
        machine.reset(&config);
        Self {
            machine,
            syscalls,
            config,
            power: Arc::new(PowerGate::new()),
            tracer: None,
            steps: 0,
            last_fault: None,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn machine(&self) -> &MachineState {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut MachineState {
        &mut self.machine
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.machine.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.machine.registers
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.machine.memory
    }

    pub fn devices_mut(&mut self) -> &mut DeviceTable {
        &mut self.machine.devices
    }

    pub fn syscalls_mut(&mut self) -> &mut S {
        &mut self.syscalls
    }

    pub fn power(&self) -> &Arc<PowerGate> {
        &self.power
    }

    pub fn set_tracer(&mut self, tracer: Option<Box<dyn ExecutionTracer>>) {
        self.tracer = tracer;
    }

    /// Total steps executed since construction.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn last_fault(&self) -> Option<&CoreError> {
        self.last_fault.as_ref()
    }

    pub fn take_fault(&mut self) -> Option<CoreError> {
        self.last_fault.take()
    }

    /// Clears the register file and reloads entry point and stack top.
    pub fn reset(&mut self) {
        self.machine.reset(&self.config);
        self.power.power_off();
    }

    pub fn is_running(&self) -> bool {
        self.machine.is_running()
    }

    pub fn power_on(&mut self) {
        self.start();
        self.power.power_on();
    }

    pub fn power_off(&mut self) {
        self.machine.request_halt();
        self.power.power_off();
    }

    pub(crate) fn start(&mut self) {
        tracing::debug!(pc = self.machine.pc(), "core powered on");
        self.machine.registers.set_flag(Flags::RUNNING, true);
    }

    /// Steps until the running flag clears.
    pub fn run(&mut self) -> CoreResult<RunSummary> {
        self.run_until(None)
    }

    /// Like [`Core::run`] but stops after `limit` steps even if still running.
    pub fn run_bounded(&mut self, limit: u64) -> CoreResult<RunSummary> {
        self.run_until(Some(limit))
    }

    fn run_until(&mut self, limit: Option<u64>) -> CoreResult<RunSummary> {
        let mut steps = 0u64;
        while self.machine.is_running() {
            if limit.is_some_and(|limit| steps >= limit) {
                break;
            }
            self.step()?;
            steps += 1;
        }
        Ok(RunSummary {
            steps,
            pc: self.machine.pc(),
            halted: !self.machine.is_running(),
        })
    }

    /// Executes one instruction. A halted core does nothing. Any fault
    /// clears the running flag and powers the core off.
    pub fn step(&mut self) -> CoreResult<StepOutcome> {
        if !self.machine.is_running() {
            return Ok(StepOutcome::Halted);
        }
        let address = self.machine.pc();
        if let Err(err) = self.execute_at(address) {
            tracing::error!("{err}");
            self.power_off();
            self.last_fault = Some(err.clone());
            return Err(err);
        }
        self.steps += 1;
        if self.machine.is_running() {
            Ok(StepOutcome::Continue)
        } else {
            self.power.power_off();
            Ok(StepOutcome::Halted)
        }
    }

    fn emit(&mut self, event: TraceEvent) {
        if let Some(tracer) = self.tracer.as_mut() {
            tracer.on_event(event);
        }
    }

    fn fetch(&mut self, address: u64) -> CoreResult<Header> {
        let MachineState {
            registers, memory, ..
        } = &mut self.machine;
        let ir = registers.cell_mut(RegisterId::Ir);
        ir.set_raw(0);
        memory.read(address, 1, ir, View::Byte0);
        let opcode = Opcode::decode(ir.byte(0))
            .map_err(|source| CoreError::Decode { address, source })?;
        let count = opcode.operation.operand_count();
        for i in 0..count {
            let at = pc_relative(address, 1 + i);
            memory.read(at, 1, ir, View::ALL[1 + i]);
        }
        let descriptors = (0..count).map(|i| Descriptor(ir.byte(1 + i))).collect();
        Ok(Header {
            opcode,
            descriptors,
        })
    }

    fn execute_at(&mut self, address: u64) -> CoreResult<()> {
        let header = self.fetch(address)?;
        self.machine.advance_pc(header.byte_len());
        let Opcode { mode, operation } = header.opcode;
        tracing::trace!(pc = address, %operation, %mode, "step");
        if self.tracer.is_some() {
            let descriptors: SmallVec<[u8; 2]> = header.descriptors.iter().map(|d| d.0).collect();
            self.emit(TraceEvent::Fetch {
                address,
                opcode: header.opcode.encode(),
                operation,
                descriptors,
            });
        }

        let first = header.descriptor(0);
        let second = header.descriptor(1);
        let mut exec = Exec {
            core: self,
            address,
        };

        match operation {
            Operation::Halt => {
                exec.core.machine.request_halt();
                exec.core.emit(TraceEvent::Halt { address });
            }
            Operation::Nop => {}
            Operation::Ld => {
                let (register, view) = exec.register(second)?;
                let (value, _) = exec.read_addressed(mode, first, view.width())?;
                exec.write_register(register, view, value);
            }
            Operation::St => {
                let (register, view) = exec.register(first)?;
                let value = exec.core.machine.registers.read(register, view);
                let target = exec.address_operand(mode, second)?;
                exec.store(target, view.width(), value);
            }
            Operation::Clr => {
                let (register, view) = exec.register(first)?;
                exec.write_register(register, view, 0);
            }
            Operation::Push => {
                let (value, width) = exec.read_addressed(mode, first, PUSH_INDIRECT_WIDTH)?;
                exec.push(width, value);
            }
            Operation::Pop => {
                let (register, view) = exec.register(first)?;
                let value = exec.core.machine.pop(view.width());
                exec.write_register(register, view, value);
            }
            Operation::Call => {
                let (target, _) = exec.read_addressed(mode, first, PC_VIEW.width())?;
                let return_address = exec.core.machine.pc();
                exec.push(PC_VIEW.width(), return_address);
                exec.jump(target);
            }
            Operation::Ret => {
                let target = exec.core.machine.pop(PC_VIEW.width());
                exec.jump(target);
            }
            Operation::Jmp => {
                let (target, _) = exec.read_addressed(mode, first, PC_VIEW.width())?;
                exec.jump(target);
            }
            Operation::Jz
            | Operation::Jnz
            | Operation::Jn
            | Operation::Jnn
            | Operation::Jo
            | Operation::Jno
            | Operation::Jc
            | Operation::Jnc => {
                let (target, _) = exec.read_addressed(mode, first, PC_VIEW.width())?;
                if let Some((flag, expected)) = operation.condition() {
                    if exec.core.machine.registers.flag(flag) == expected {
                        exec.jump(target);
                    }
                }
            }
            op if op.is_unary() => {
                let (register, view) = exec.register(first)?;
                exec.arithmetic(op, register, view, 1, view.width())?;
            }
            op if op.is_alu() => {
                let (register, view) = exec.register(second)?;
                let (value, width) = exec.read_addressed(mode, first, view.width())?;
                exec.arithmetic(op, register, view, value, width)?;
            }
            Operation::Out => {
                let (register, view) = exec.register(first)?;
                let id = exec.device_id(mode, second)?;
                let value = exec.core.machine.registers.read(register, view);
                let access = exec.device_access(id, view.width());
                let device = exec
                    .core
                    .machine
                    .devices
                    .get_mut(id)
                    .ok_or(CoreError::UnknownDevice { address, id })?;
                device.set(value, access);
                exec.core.emit(TraceEvent::DeviceOut { id, value });
            }
            Operation::In => {
                let (register, view) = exec.register(first)?;
                let id = exec.device_id(mode, second)?;
                let access = exec.device_access(id, view.width());
                let device = exec
                    .core
                    .machine
                    .devices
                    .get_mut(id)
                    .ok_or(CoreError::UnknownDevice { address, id })?;
                let value = device.enable(access).unwrap_or_else(|| {
                    tracing::warn!(id, "device has no input, reading zero");
                    0
                });
                exec.core.emit(TraceEvent::DeviceIn { id, value });
                exec.write_register(register, view, value);
            }
            Operation::Sys => {
                let (id, _) = exec.read_addressed(mode, first, SYSCALL_ID_WIDTH)?;
                let id = id as u8;
                let core = &mut *exec.core;
                let result = core.syscalls.call(id, &mut core.machine);
                exec.core.emit(TraceEvent::Syscall { id, result });
                exec.write_register(RegisterId::A, View::Full, result);
            }
            _ => {
                return Err(CoreError::Decode {
                    address,
                    source: DecodeError::UnknownOperation {
                        opcode: header.opcode.encode(),
                    },
                });
            }
        }
        Ok(())
    }
}

/// Operand plumbing for the instruction currently executing.
struct Exec<'a, S: SyscallGateway> {
    core: &'a mut Core<S>,
    address: u64,
}

impl<S: SyscallGateway> Exec<'_, S> {
    fn register(&self, descriptor: Descriptor) -> CoreResult<(RegisterId, View)> {
        descriptor.operand().map_err(|source| CoreError::Decode {
            address: self.address,
            source,
        })
    }

    /// Reads an immediate at `PC` and moves `PC` past it.
    fn take_immediate(&mut self, width: Width) -> u64 {
        let machine = &mut self.core.machine;
        let pc = machine.pc();
        let mut bytes = [0u8; 8];
        for (i, byte) in bytes[..width.bytes()].iter_mut().enumerate() {
            *byte = machine.memory.read_byte(pc_relative(pc, i));
        }
        machine.advance_pc(width.bytes());
        u64::from_le_bytes(bytes)
    }

    /// Resolves the mode-addressed operand. Indirect forms load `width`
    /// bytes from memory; direct forms carry their own width.
    fn read_addressed(
        &mut self,
        mode: Mode,
        descriptor: Descriptor,
        width: Width,
    ) -> CoreResult<(u64, Width)> {
        Ok(match mode {
            Mode::Register => {
                let (register, view) = self.register(descriptor)?;
                (self.core.machine.registers.read(register, view), view.width())
            }
            Mode::Immediate => {
                let size = descriptor.immediate_width();
                (self.take_immediate(size), size)
            }
            Mode::RegisterIndirect => {
                let (register, view) = self.register(descriptor)?;
                let target = self.core.machine.registers.read(register, view);
                (self.core.machine.memory.read_sized(target, width), width)
            }
            Mode::ImmediateIndirect => {
                let target = self.take_immediate(descriptor.immediate_width());
                (self.core.machine.memory.read_sized(target, width), width)
            }
        })
    }

    /// Memory address named by an indirect-mode descriptor.
    fn address_operand(&mut self, mode: Mode, descriptor: Descriptor) -> CoreResult<u64> {
        match mode {
            Mode::RegisterIndirect => {
                let (register, view) = self.register(descriptor)?;
                Ok(self.core.machine.registers.read(register, view))
            }
            Mode::ImmediateIndirect => Ok(self.take_immediate(descriptor.immediate_width())),
            _ => Err(CoreError::Decode {
                address: self.address,
                source: DecodeError::UnsupportedMode {
                    operation: Operation::St,
                    mode,
                },
            }),
        }
    }

    fn device_id(&mut self, mode: Mode, descriptor: Descriptor) -> CoreResult<u16> {
        let (id, _) = self.read_addressed(mode, descriptor, DEVICE_ID_WIDTH)?;
        Ok(id as u16)
    }

    fn device_access(&self, id: u16, width: Width) -> DeviceAccess {
        DeviceAccess {
            id,
            width: width.bytes(),
            address: self.address,
        }
    }

    fn write_register(&mut self, register: RegisterId, view: View, value: u64) {
        self.core.machine.registers.write(register, view, value);
        self.core.emit(TraceEvent::RegisterWrite {
            register,
            view,
            value: value & view.width().mask(),
        });
    }

    fn store(&mut self, address: u64, width: Width, value: u64) {
        self.core.machine.memory.write_sized(address, width, value);
        self.core.emit(TraceEvent::MemoryWrite {
            address,
            width,
            value: value & width.mask(),
        });
    }

    fn push(&mut self, width: Width, value: u64) {
        self.core.machine.push(width, value);
        let sp = self.core.machine.sp();
        self.core.emit(TraceEvent::MemoryWrite {
            address: sp,
            width,
            value: value & width.mask(),
        });
    }

    fn jump(&mut self, target: u64) {
        self.core.machine.set_pc(target);
        self.core.emit(TraceEvent::RegisterWrite {
            register: RegisterId::Pc,
            view: PC_VIEW,
            value: target & PC_VIEW.width().mask(),
        });
    }

    /// Stages `dst OP src` into an ALU bundle, commits flags and, unless the
    /// operation only compares, the result.
    fn arithmetic(
        &mut self,
        operation: Operation,
        register: RegisterId,
        view: View,
        source: u64,
        source_width: Width,
    ) -> CoreResult<()> {
        let width = view.width();
        let left = self.core.machine.registers.read(register, view);
        let mut bundle = AluBundle::new(operation, source_width, width, source, left);
        let mut flags = self.core.machine.registers.flags();
        let result = bundle.execute(&mut flags).map_err(|source| CoreError::Alu {
            address: self.address,
            source,
        })?;
        self.core.machine.registers.set_flags(flags);
        self.core.emit(TraceEvent::AluOp {
            operation,
            width,
            left,
            right: source & source_width.mask(),
            result,
            flags,
        });
        if operation.commits_result() {
            self.write_register(register, view, result);
        }
        Ok(())
    }
}
