//! Processor core: register file, decoder, ALU and the step loop that ties
//! them to memory, devices and the syscall gateway.

pub mod alu;
pub mod cpu;
pub mod decode;
pub mod encode;
pub mod error;
pub mod flags;
pub mod power;
pub mod register;
pub mod state;
pub mod syscall;
pub mod trace;

pub use alu::{AluBundle, AluError, AluResult};
pub use cpu::{Core, RunSummary, StepOutcome};
pub use decode::{Descriptor, Header, Mode, Opcode, Operation};
pub use encode::ProgramBuilder;
pub use error::{CoreError, CoreResult, DecodeError, DecodeResult};
pub use flags::Flags;
pub use power::{CoreWorker, PowerGate, PowerState};
pub use register::{Register, RegisterFile, RegisterId, View, Width, REGISTER_COUNT};
pub use state::{CoreConfig, MachineState, DEFAULT_STACK_TOP, PC_VIEW, SP_VIEW};
pub use syscall::{
    SyscallGateway, SyscallHandler, SyscallTable, SYSCALL_ARGUMENTS, UNHANDLED_SYSCALL,
};
pub use trace::{ExecutionTracer, PipelinePrinter, TraceEvent};
