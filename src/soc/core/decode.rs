//! Pure extraction of instruction fields from already-fetched bytes.
//!
//! Opcode byte: bits 7..6 addressing mode, bits 5..0 operation.
//! Descriptor byte: bits 7..4 register, bits 3..0 view or immediate size code.
use std::fmt;

use smallvec::SmallVec;

use crate::soc::core::error::{DecodeError, DecodeResult};
use crate::soc::core::flags::Flags;
use crate::soc::core::register::{RegisterId, View, Width};

/// Addressing mode of the instruction's addressed operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Mode {
    Register = 0b00,
    Immediate = 0b01,
    RegisterIndirect = 0b10,
    ImmediateIndirect = 0b11,
}

impl Mode {
    #[inline(always)]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Mode::Register,
            0b01 => Mode::Immediate,
            0b10 => Mode::RegisterIndirect,
            _ => Mode::ImmediateIndirect,
        }
    }

    #[inline(always)]
    pub const fn is_immediate(self) -> bool {
        matches!(self, Mode::Immediate | Mode::ImmediateIndirect)
    }

    #[inline(always)]
    pub const fn is_indirect(self) -> bool {
        matches!(self, Mode::RegisterIndirect | Mode::ImmediateIndirect)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Mode::Register => "register",
            Mode::Immediate => "immediate",
            Mode::RegisterIndirect => "register-indirect",
            Mode::ImmediateIndirect => "immediate-indirect",
        };
        f.write_str(text)
    }
}

macro_rules! operations {
    ($($variant:ident = $code:literal, $mnemonic:literal, $operands:literal;)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Operation {
            $($variant = $code,)*
        }

        impl Operation {
            pub const fn from_code(code: u8) -> Option<Self> {
                match code {
                    $($code => Some(Operation::$variant),)*
                    _ => None,
                }
            }

            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $(Operation::$variant => $mnemonic,)*
                }
            }

            /// Number of descriptor bytes following the opcode.
            pub const fn operand_count(self) -> usize {
                match self {
                    $(Operation::$variant => $operands,)*
                }
            }
        }
    };
}

operations! {
    Halt = 0x00, "HALT", 0;
    Ld   = 0x01, "LD",   2;
    St   = 0x02, "ST",   2;
    Clr  = 0x03, "CLR",  1;
    Push = 0x04, "PUSH", 1;
    Pop  = 0x05, "POP",  1;
    Call = 0x06, "CALL", 1;
    Ret  = 0x07, "RET",  0;
    Jmp  = 0x08, "JMP",  1;
    Jz   = 0x09, "JZ",   1;
    Jnz  = 0x0A, "JNZ",  1;
    Jn   = 0x0B, "JN",   1;
    Jnn  = 0x0C, "JNN",  1;
    Jo   = 0x0D, "JO",   1;
    Jno  = 0x0E, "JNO",  1;
    Jc   = 0x0F, "JC",   1;
    Add  = 0x10, "ADD",  2;
    Sub  = 0x11, "SUB",  2;
    Mul  = 0x12, "MUL",  2;
    Div  = 0x13, "DIV",  2;
    Mod  = 0x14, "MOD",  2;
    And  = 0x15, "AND",  2;
    Or   = 0x16, "OR",   2;
    Nor  = 0x17, "NOR",  2;
    Nand = 0x18, "NAND", 2;
    Xor  = 0x19, "XOR",  2;
    Shl  = 0x1A, "SHL",  2;
    Shr  = 0x1B, "SHR",  2;
    Cmp  = 0x1C, "CMP",  2;
    Test = 0x1D, "TEST", 2;
    Inc  = 0x1E, "INC",  1;
    Dec  = 0x1F, "DEC",  1;
    Not  = 0x20, "NOT",  1;
    Out  = 0x21, "OUT",  2;
    In   = 0x22, "IN",   2;
    Sys  = 0x23, "SYS",  1;
    Nop  = 0x24, "NOP",  0;
    Jnc  = 0x25, "JNC",  1;
}

impl Operation {
    #[inline(always)]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Operations routed through the ALU.
    pub const fn is_alu(self) -> bool {
        matches!(self.code(), 0x10..=0x20)
    }

    pub const fn is_unary(self) -> bool {
        matches!(self, Operation::Inc | Operation::Dec | Operation::Not)
    }

    /// Compare and test only update flags.
    pub const fn commits_result(self) -> bool {
        !matches!(self, Operation::Cmp | Operation::Test)
    }

    /// Flag and expected state tested by a conditional jump.
    pub const fn condition(self) -> Option<(Flags, bool)> {
        match self {
            Operation::Jz => Some((Flags::ZERO, true)),
            Operation::Jnz => Some((Flags::ZERO, false)),
            Operation::Jn => Some((Flags::NEGATIVE, true)),
            Operation::Jnn => Some((Flags::NEGATIVE, false)),
            Operation::Jo => Some((Flags::OVERFLOW, true)),
            Operation::Jno => Some((Flags::OVERFLOW, false)),
            Operation::Jc => Some((Flags::CARRY, true)),
            Operation::Jnc => Some((Flags::CARRY, false)),
            _ => None,
        }
    }

    pub const fn accepts(self, mode: Mode) -> bool {
        match self {
            Operation::St => mode.is_indirect(),
            Operation::Halt
            | Operation::Ret
            | Operation::Nop
            | Operation::Clr
            | Operation::Pop
            | Operation::Inc
            | Operation::Dec
            | Operation::Not => matches!(mode, Mode::Register),
            _ => true,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.mnemonic())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub mode: Mode,
    pub operation: Operation,
}

impl Opcode {
    pub const fn new(mode: Mode, operation: Operation) -> Self {
        Self { mode, operation }
    }

    #[inline(always)]
    pub const fn encode(self) -> u8 {
        ((self.mode as u8) << 6) | self.operation.code()
    }

    /// Classifies an opcode byte, rejecting unknown operations and modes the
    /// operation cannot use.
    pub fn decode(byte: u8) -> DecodeResult<Self> {
        let mode = Mode::from_bits(byte >> 6);
        let operation =
            Operation::from_code(byte & 0x3F).ok_or(DecodeError::UnknownOperation { opcode: byte })?;
        if !operation.accepts(mode) {
            return Err(DecodeError::UnsupportedMode { operation, mode });
        }
        Ok(Self { mode, operation })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor(pub u8);

impl Descriptor {
    #[inline(always)]
    pub const fn register_view(register: RegisterId, view: View) -> Self {
        Self(((register as u8) << 4) | view.index())
    }

    #[inline(always)]
    pub const fn immediate(width: Width) -> Self {
        Self(width.size_code())
    }

    #[inline(always)]
    pub const fn register(self) -> RegisterId {
        RegisterId::from_nibble(self.0 >> 4)
    }

    #[inline(always)]
    pub fn view(self) -> DecodeResult<View> {
        View::from_nibble(self.0).ok_or(DecodeError::InvalidView { descriptor: self.0 })
    }

    #[inline(always)]
    pub fn operand(self) -> DecodeResult<(RegisterId, View)> {
        Ok((self.register(), self.view()?))
    }

    #[inline(always)]
    pub const fn immediate_width(self) -> Width {
        Width::from_size_code(self.0)
    }
}

/// Opcode plus the descriptor bytes the operation declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub opcode: Opcode,
    pub descriptors: SmallVec<[Descriptor; 2]>,
}

impl Header {
    pub fn byte_len(&self) -> usize {
        1 + self.descriptors.len()
    }

    /// Descriptor byte `index` (0 = byte 1 of the instruction).
    pub fn descriptor(&self, index: usize) -> Descriptor {
        self.descriptors.get(index).copied().unwrap_or(Descriptor(0))
    }
}
