//! Binary encoder for the instruction format, used to build images in code.
//!
//! Jump and call targets are always emitted as 4-byte immediates to match the
//! width of the program counter view.
use crate::soc::core::decode::{Descriptor, Mode, Opcode, Operation};
use crate::soc::core::register::{RegisterId, View, Width};
use crate::soc::core::state::PC_VIEW;

#[derive(Debug, Clone, Default)]
pub struct ProgramBuilder {
    bytes: Vec<u8>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset the next instruction will be emitted at.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// Emits opcode, descriptors and an optional little-endian immediate.
    pub fn instruction(
        mut self,
        mode: Mode,
        operation: Operation,
        descriptors: &[Descriptor],
        immediate: Option<(Width, u64)>,
    ) -> Self {
        self.bytes.push(Opcode::new(mode, operation).encode());
        self.bytes.extend(descriptors.iter().map(|d| d.0));
        if let Some((width, value)) = immediate {
            self.bytes
                .extend_from_slice(&value.to_le_bytes()[..width.bytes()]);
        }
        self
    }

    pub fn halt(self) -> Self {
        self.instruction(Mode::Register, Operation::Halt, &[], None)
    }

    pub fn nop(self) -> Self {
        self.instruction(Mode::Register, Operation::Nop, &[], None)
    }

    pub fn ret(self) -> Self {
        self.instruction(Mode::Register, Operation::Ret, &[], None)
    }

    pub fn ld(self, src: RegisterId, src_view: View, dst: RegisterId, dst_view: View) -> Self {
        self.alu(Operation::Ld, src, src_view, dst, dst_view)
    }

    pub fn ld_imm(self, width: Width, value: u64, dst: RegisterId, dst_view: View) -> Self {
        self.alu_imm(Operation::Ld, width, value, dst, dst_view)
    }

    /// `dst ← mem[addr_reg.addr_view]`
    pub fn ld_ind(self, addr: RegisterId, addr_view: View, dst: RegisterId, dst_view: View) -> Self {
        self.instruction(
            Mode::RegisterIndirect,
            Operation::Ld,
            &[
                Descriptor::register_view(addr, addr_view),
                Descriptor::register_view(dst, dst_view),
            ],
            None,
        )
    }

    /// `dst ← mem[address]`
    pub fn ld_abs(self, address: u64, dst: RegisterId, dst_view: View) -> Self {
        self.instruction(
            Mode::ImmediateIndirect,
            Operation::Ld,
            &[
                Descriptor::immediate(Width::Full),
                Descriptor::register_view(dst, dst_view),
            ],
            Some((Width::Full, address)),
        )
    }

    /// `mem[addr_reg.addr_view] ← src`
    pub fn st_ind(self, src: RegisterId, src_view: View, addr: RegisterId, addr_view: View) -> Self {
        self.instruction(
            Mode::RegisterIndirect,
            Operation::St,
            &[
                Descriptor::register_view(src, src_view),
                Descriptor::register_view(addr, addr_view),
            ],
            None,
        )
    }

    /// `mem[address] ← src`
    pub fn st_abs(self, src: RegisterId, src_view: View, address: u64) -> Self {
        self.instruction(
            Mode::ImmediateIndirect,
            Operation::St,
            &[
                Descriptor::register_view(src, src_view),
                Descriptor::immediate(Width::Full),
            ],
            Some((Width::Full, address)),
        )
    }

    pub fn clr(self, register: RegisterId, view: View) -> Self {
        self.unary(Operation::Clr, register, view)
    }

    pub fn push(self, register: RegisterId, view: View) -> Self {
        self.unary(Operation::Push, register, view)
    }

    pub fn push_imm(self, width: Width, value: u64) -> Self {
        self.instruction(
            Mode::Immediate,
            Operation::Push,
            &[Descriptor::immediate(width)],
            Some((width, value)),
        )
    }

    pub fn pop(self, register: RegisterId, view: View) -> Self {
        self.unary(Operation::Pop, register, view)
    }

    pub fn call_imm(self, target: u64) -> Self {
        self.jump_imm(Operation::Call, target)
    }

    /// `JMP`, `CALL` or a conditional jump to an absolute target.
    pub fn jump_imm(self, operation: Operation, target: u64) -> Self {
        let width = PC_VIEW.width();
        self.instruction(
            Mode::Immediate,
            operation,
            &[Descriptor::immediate(width)],
            Some((width, target)),
        )
    }

    pub fn jump_reg(self, operation: Operation, register: RegisterId, view: View) -> Self {
        self.unary(operation, register, view)
    }

    /// Two-operand register form: `dst ← dst OP src`.
    pub fn alu(
        self,
        operation: Operation,
        src: RegisterId,
        src_view: View,
        dst: RegisterId,
        dst_view: View,
    ) -> Self {
        self.instruction(
            Mode::Register,
            operation,
            &[
                Descriptor::register_view(src, src_view),
                Descriptor::register_view(dst, dst_view),
            ],
            None,
        )
    }

    pub fn alu_imm(
        self,
        operation: Operation,
        width: Width,
        value: u64,
        dst: RegisterId,
        dst_view: View,
    ) -> Self {
        self.instruction(
            Mode::Immediate,
            operation,
            &[
                Descriptor::immediate(width),
                Descriptor::register_view(dst, dst_view),
            ],
            Some((width, value)),
        )
    }

    /// Single register-operand form (`INC`, `DEC`, `NOT`, `CLR`, `PUSH`, `POP`).
    pub fn unary(self, operation: Operation, register: RegisterId, view: View) -> Self {
        self.instruction(
            Mode::Register,
            operation,
            &[Descriptor::register_view(register, view)],
            None,
        )
    }

    pub fn out_imm(self, register: RegisterId, view: View, device: u16) -> Self {
        self.device_imm(Operation::Out, register, view, device)
    }

    pub fn in_imm(self, register: RegisterId, view: View, device: u16) -> Self {
        self.device_imm(Operation::In, register, view, device)
    }

    fn device_imm(self, operation: Operation, register: RegisterId, view: View, device: u16) -> Self {
        self.instruction(
            Mode::Immediate,
            operation,
            &[
                Descriptor::register_view(register, view),
                Descriptor::immediate(Width::Half),
            ],
            Some((Width::Half, device as u64)),
        )
    }

    pub fn sys_imm(self, id: u8) -> Self {
        self.instruction(
            Mode::Immediate,
            Operation::Sys,
            &[Descriptor::immediate(Width::Byte)],
            Some((Width::Byte, id as u64)),
        )
    }

    pub fn sys(self, register: RegisterId, view: View) -> Self {
        self.unary(Operation::Sys, register, view)
    }
}
