//! Arithmetic/logic unit.
//!
//! Every computation runs on the native unsigned integer of the operand
//! width, so wrap detection and the sign bit are always evaluated at that
//! width rather than on a widened value.
use std::{
    error::Error,
    fmt,
    ops::{BitAnd, BitOr, BitXor, Not},
};

use crate::soc::core::decode::Operation;
use crate::soc::core::flags::Flags;
use crate::soc::core::register::{Register, View, Width};

pub type AluResult<T> = Result<T, AluError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluError {
    DivideByZero { operation: Operation },
    UnsupportedOperation { opcode: u8 },
}

impl fmt::Display for AluError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AluError::DivideByZero { operation } => write!(f, "{operation} by zero"),
            AluError::UnsupportedOperation { opcode } => {
                write!(f, "operation 0x{opcode:02X} is not an ALU operation")
            }
        }
    }
}

impl Error for AluError {}

/// Transient staging record for one computation. The destination scratch
/// register is the left operand and receives the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluBundle {
    pub opcode: u8,
    pub src_width: Width,
    pub dst_width: Width,
    pub src: Register,
    pub dst: Register,
}

impl AluBundle {
    pub fn new(operation: Operation, src_width: Width, dst_width: Width, src: u64, dst: u64) -> Self {
        Self {
            opcode: operation.code(),
            src_width,
            dst_width,
            src: Register::new(src),
            dst: Register::new(dst),
        }
    }

    /// Runs the staged operation at the destination width, stores the result
    /// in the destination scratch register and updates the arithmetic flags.
    /// On a fault neither the result nor `flags` are touched.
    pub fn execute(&mut self, flags: &mut Flags) -> AluResult<u64> {
        let operation = Operation::from_code(self.opcode)
            .filter(|op| op.is_alu())
            .ok_or(AluError::UnsupportedOperation { opcode: self.opcode })?;
        let width = self.dst_width;
        let left = self.dst.read(View::low(width));
        let right = self.src.read(View::low(self.src_width));
        let (result, computed) = match width {
            Width::Byte => evaluate::<u8>(operation, left, right)?,
            Width::Half => evaluate::<u16>(operation, left, right)?,
            Width::Quarter => evaluate::<u32>(operation, left, right)?,
            Width::Full => evaluate::<u64>(operation, left, right)?,
        };
        self.dst.write(View::low(width), result);
        flags.remove(Flags::ARITHMETIC);
        flags.insert(computed);
        Ok(result)
    }
}

trait AluWord:
    Copy
    + Eq
    + Ord
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + BitXor<Output = Self>
    + Not<Output = Self>
{
    const BITS: u32;
    const ZERO: Self;
    const ONE: Self;

    fn truncate(value: u64) -> Self;
    fn widen(self) -> u64;
    fn wrapping_add(self, rhs: Self) -> Self;
    fn wrapping_sub(self, rhs: Self) -> Self;
    fn overflowing_mul(self, rhs: Self) -> (Self, bool);
    fn checked_div(self, rhs: Self) -> Option<Self>;
    fn checked_rem(self, rhs: Self) -> Option<Self>;
    fn shift_left(self, amount: u32) -> Self;
    fn shift_right(self, amount: u32) -> Self;
    fn count_ones(self) -> u32;
    fn signed_lt(self, rhs: Self) -> bool;

    #[inline(always)]
    fn msb(self) -> bool {
        (self.widen() >> (Self::BITS - 1)) & 1 == 1
    }
}

macro_rules! impl_alu_word {
    ($unsigned:ty, $signed:ty) => {
        impl AluWord for $unsigned {
            const BITS: u32 = <$unsigned>::BITS;
            const ZERO: Self = 0;
            const ONE: Self = 1;

            #[inline(always)]
            fn truncate(value: u64) -> Self {
                value as $unsigned
            }

            #[inline(always)]
            fn widen(self) -> u64 {
                self as u64
            }

            #[inline(always)]
            fn wrapping_add(self, rhs: Self) -> Self {
                <$unsigned>::wrapping_add(self, rhs)
            }

            #[inline(always)]
            fn wrapping_sub(self, rhs: Self) -> Self {
                <$unsigned>::wrapping_sub(self, rhs)
            }

            #[inline(always)]
            fn overflowing_mul(self, rhs: Self) -> (Self, bool) {
                <$unsigned>::overflowing_mul(self, rhs)
            }

            #[inline(always)]
            fn checked_div(self, rhs: Self) -> Option<Self> {
                <$unsigned>::checked_div(self, rhs)
            }

            #[inline(always)]
            fn checked_rem(self, rhs: Self) -> Option<Self> {
                <$unsigned>::checked_rem(self, rhs)
            }

            #[inline(always)]
            fn shift_left(self, amount: u32) -> Self {
                self.checked_shl(amount).unwrap_or(0)
            }

            #[inline(always)]
            fn shift_right(self, amount: u32) -> Self {
                self.checked_shr(amount).unwrap_or(0)
            }

            #[inline(always)]
            fn count_ones(self) -> u32 {
                <$unsigned>::count_ones(self)
            }

            #[inline(always)]
            fn signed_lt(self, rhs: Self) -> bool {
                (self as $signed) < (rhs as $signed)
            }
        }
    };
}

impl_alu_word!(u8, i8);
impl_alu_word!(u16, i16);
impl_alu_word!(u32, i32);
impl_alu_word!(u64, i64);

fn evaluate<T: AluWord>(operation: Operation, left: u64, right: u64) -> AluResult<(u64, Flags)> {
    let l = T::truncate(left);
    let r = T::truncate(right);
    let mut flags = Flags::empty();
    let mut signed_less = None;

    let result = match operation {
        Operation::Add | Operation::Inc => {
            let rhs = if operation == Operation::Inc { T::ONE } else { r };
            let value = l.wrapping_add(rhs);
            let wrapped = value < l;
            flags.set(Flags::OVERFLOW | Flags::CARRY, wrapped);
            value
        }
        Operation::Sub | Operation::Cmp | Operation::Dec => {
            let rhs = if operation == Operation::Dec { T::ONE } else { r };
            let value = l.wrapping_sub(rhs);
            let wrapped = value > l;
            flags.set(Flags::OVERFLOW | Flags::CARRY, wrapped);
            signed_less = Some(l.signed_lt(rhs));
            value
        }
        Operation::Mul => {
            let (value, overflowed) = l.overflowing_mul(r);
            flags.set(Flags::OVERFLOW | Flags::CARRY, overflowed);
            value
        }
        Operation::Div => l
            .checked_div(r)
            .ok_or(AluError::DivideByZero { operation })?,
        Operation::Mod => l
            .checked_rem(r)
            .ok_or(AluError::DivideByZero { operation })?,
        Operation::And | Operation::Test => l & r,
        Operation::Or => l | r,
        Operation::Nor => !(l | r),
        Operation::Nand => !(l & r),
        Operation::Xor => l ^ r,
        Operation::Not => !l,
        Operation::Shl | Operation::Shr => {
            let (value, lost) = shift(operation, l, right);
            flags.set(Flags::OVERFLOW | Flags::CARRY, lost);
            value
        }
        _ => {
            return Err(AluError::UnsupportedOperation {
                opcode: operation.code(),
            });
        }
    };

    flags.set(Flags::ZERO, result == T::ZERO);
    flags.set(Flags::NEGATIVE, result.msb());
    flags.set(Flags::PARITY, result.count_ones() % 2 == 0);
    flags.set(Flags::SIGN, signed_less.unwrap_or_else(|| result.msb()));
    Ok((result.widen(), flags))
}

/// Shift by the full 64-bit right operand; reports whether any set bit fell
/// off the end.
fn shift<T: AluWord>(operation: Operation, value: T, amount: u64) -> (T, bool) {
    if amount >= T::BITS as u64 {
        return (T::ZERO, value != T::ZERO);
    }
    let amount = amount as u32;
    if amount == 0 {
        return (value, false);
    }
    match operation {
        Operation::Shl => {
            let lost = value.shift_right(T::BITS - amount) != T::ZERO;
            (value.shift_left(amount), lost)
        }
        _ => {
            let dropped = value.widen() & ((1u64 << amount) - 1);
            (value.shift_right(amount), dropped != 0)
        }
    }
}
