//! Register file with overlapping width-tiered views.
//!
//! Every register is a single 64-bit cell. Views are pure projections keyed by
//! (width, bit offset), so a write through a narrow lane only touches its own
//! bits and never aliases storage through another type.
use std::fmt;

use crate::soc::core::flags::Flags;

pub const REGISTER_COUNT: usize = 16;

/// Operand width in bytes. Only the four native unsigned widths exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Width {
    Byte = 1,
    Half = 2,
    Quarter = 4,
    Full = 8,
}

impl Width {
    pub const ALL: [Width; 4] = [Width::Byte, Width::Half, Width::Quarter, Width::Full];

    /// Decodes the 2-bit immediate size code (00=1, 01=2, 10=4, 11=8).
    #[inline(always)]
    pub const fn from_size_code(code: u8) -> Self {
        match code & 0b11 {
            0b00 => Width::Byte,
            0b01 => Width::Half,
            0b10 => Width::Quarter,
            _ => Width::Full,
        }
    }

    #[inline(always)]
    pub const fn size_code(self) -> u8 {
        match self {
            Width::Byte => 0b00,
            Width::Half => 0b01,
            Width::Quarter => 0b10,
            Width::Full => 0b11,
        }
    }

    #[inline(always)]
    pub const fn bytes(self) -> usize {
        self as usize
    }

    #[inline(always)]
    pub const fn bits(self) -> u32 {
        (self as u32) * 8
    }

    #[inline(always)]
    pub const fn mask(self) -> u64 {
        match self {
            Width::Full => u64::MAX,
            _ => (1u64 << self.bits()) - 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RegisterId {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
    E = 4,
    F = 5,
    G = 6,
    H = 7,
    I = 8,
    J = 9,
    K = 10,
    L = 11,
    Flags = 12,
    Ir = 13,
    Pc = 14,
    Sp = 15,
}

impl RegisterId {
    pub const ALL: [RegisterId; REGISTER_COUNT] = [
        RegisterId::A,
        RegisterId::B,
        RegisterId::C,
        RegisterId::D,
        RegisterId::E,
        RegisterId::F,
        RegisterId::G,
        RegisterId::H,
        RegisterId::I,
        RegisterId::J,
        RegisterId::K,
        RegisterId::L,
        RegisterId::Flags,
        RegisterId::Ir,
        RegisterId::Pc,
        RegisterId::Sp,
    ];

    /// Every nibble names a register, so this never fails.
    #[inline(always)]
    pub const fn from_nibble(nibble: u8) -> Self {
        Self::ALL[(nibble & 0x0F) as usize]
    }

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            RegisterId::A => "A",
            RegisterId::B => "B",
            RegisterId::C => "C",
            RegisterId::D => "D",
            RegisterId::E => "E",
            RegisterId::F => "F",
            RegisterId::G => "G",
            RegisterId::H => "H",
            RegisterId::I => "I",
            RegisterId::J => "J",
            RegisterId::K => "K",
            RegisterId::L => "L",
            RegisterId::Flags => "FLAGS",
            RegisterId::Ir => "IR",
            RegisterId::Pc => "PC",
            RegisterId::Sp => "SP",
        }
    }
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// One of the fifteen lanes a register exposes. Tiers never overlap within
/// themselves: eight bytes, four halves, two quarters, one full word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum View {
    Byte0 = 0,
    Byte1 = 1,
    Byte2 = 2,
    Byte3 = 3,
    Byte4 = 4,
    Byte5 = 5,
    Byte6 = 6,
    Byte7 = 7,
    Half0 = 8,
    Half1 = 9,
    Half2 = 10,
    Half3 = 11,
    Quarter0 = 12,
    Quarter1 = 13,
    Full = 14,
}

impl View {
    pub const ALL: [View; 15] = [
        View::Byte0,
        View::Byte1,
        View::Byte2,
        View::Byte3,
        View::Byte4,
        View::Byte5,
        View::Byte6,
        View::Byte7,
        View::Half0,
        View::Half1,
        View::Half2,
        View::Half3,
        View::Quarter0,
        View::Quarter1,
        View::Full,
    ];

    /// Nibble 15 has no view.
    #[inline(always)]
    pub const fn from_nibble(nibble: u8) -> Option<Self> {
        let index = (nibble & 0x0F) as usize;
        if index < Self::ALL.len() {
            Some(Self::ALL[index])
        } else {
            None
        }
    }

    #[inline(always)]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Lowest view of the tier with the given width.
    pub const fn low(width: Width) -> Self {
        match width {
            Width::Byte => View::Byte0,
            Width::Half => View::Half0,
            Width::Quarter => View::Quarter0,
            Width::Full => View::Full,
        }
    }

    #[inline(always)]
    pub const fn width(self) -> Width {
        match self as u8 {
            0..=7 => Width::Byte,
            8..=11 => Width::Half,
            12..=13 => Width::Quarter,
            _ => Width::Full,
        }
    }

    /// Position of the lane within its tier.
    #[inline(always)]
    const fn lane(self) -> u32 {
        match self as u8 {
            idx @ 0..=7 => idx as u32,
            idx @ 8..=11 => (idx - 8) as u32,
            idx @ 12..=13 => (idx - 12) as u32,
            _ => 0,
        }
    }

    #[inline(always)]
    pub const fn bit_offset(self) -> u32 {
        self.lane() * self.width().bits()
    }

    #[inline(always)]
    pub const fn byte_offset(self) -> usize {
        (self.bit_offset() / 8) as usize
    }

    /// Mask of the view's span positioned inside the 64-bit cell.
    #[inline(always)]
    pub const fn span_mask(self) -> u64 {
        self.width().mask() << self.bit_offset()
    }

    pub const fn name(self) -> &'static str {
        match self {
            View::Byte0 => "byte0",
            View::Byte1 => "byte1",
            View::Byte2 => "byte2",
            View::Byte3 => "byte3",
            View::Byte4 => "byte4",
            View::Byte5 => "byte5",
            View::Byte6 => "byte6",
            View::Byte7 => "byte7",
            View::Half0 => "half0",
            View::Half1 => "half1",
            View::Half2 => "half2",
            View::Half3 => "half3",
            View::Quarter0 => "quarter0",
            View::Quarter1 => "quarter1",
            View::Full => "full",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// A single 64-bit storage cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Register(u64);

impl Register {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline(always)]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline(always)]
    pub fn set_raw(&mut self, value: u64) {
        self.0 = value;
    }

    #[inline(always)]
    pub const fn read(self, view: View) -> u64 {
        (self.0 >> view.bit_offset()) & view.width().mask()
    }

    /// Masks `value` to the view and leaves every other bit untouched.
    #[inline(always)]
    pub fn write(&mut self, view: View, value: u64) {
        let span = view.span_mask();
        let shifted = (value & view.width().mask()) << view.bit_offset();
        self.0 = (self.0 & !span) | shifted;
    }

    /// Adds a signed delta to the view, wrapping within the view's width.
    #[inline(always)]
    pub fn increment(&mut self, view: View, delta: i64) {
        let current = self.read(view);
        self.write(view, current.wrapping_add(delta as u64));
    }

    #[inline(always)]
    pub fn decrement(&mut self, view: View, delta: i64) {
        let current = self.read(view);
        self.write(view, current.wrapping_sub(delta as u64));
    }

    #[inline(always)]
    pub fn byte(self, index: usize) -> u8 {
        self.0.to_le_bytes()[index & 7]
    }

    #[inline(always)]
    pub fn set_byte(&mut self, index: usize, value: u8) {
        let mut bytes = self.0.to_le_bytes();
        bytes[index & 7] = value;
        self.0 = u64::from_le_bytes(bytes);
    }
}

/// The sixteen architectural registers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterFile {
    cells: [Register; REGISTER_COUNT],
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn read(&self, register: RegisterId, view: View) -> u64 {
        self.cells[register.index()].read(view)
    }

    #[inline(always)]
    pub fn write(&mut self, register: RegisterId, view: View, value: u64) {
        self.cells[register.index()].write(view, value);
    }

    #[inline(always)]
    pub fn increment(&mut self, register: RegisterId, view: View, delta: i64) {
        self.cells[register.index()].increment(view, delta);
    }

    #[inline(always)]
    pub fn decrement(&mut self, register: RegisterId, view: View, delta: i64) {
        self.cells[register.index()].decrement(view, delta);
    }

    #[inline(always)]
    pub fn cell(&self, register: RegisterId) -> &Register {
        &self.cells[register.index()]
    }

    #[inline(always)]
    pub fn cell_mut(&mut self, register: RegisterId) -> &mut Register {
        &mut self.cells[register.index()]
    }

    pub fn flags(&self) -> Flags {
        Flags::from_bits_retain(self.cells[RegisterId::Flags.index()].raw())
    }

    pub fn set_flags(&mut self, flags: Flags) {
        self.cells[RegisterId::Flags.index()].set_raw(flags.bits());
    }

    /// Boolean projection over one bit of the flags register.
    #[inline(always)]
    pub fn flag(&self, flag: Flags) -> bool {
        self.flags().contains(flag)
    }

    #[inline(always)]
    pub fn set_flag(&mut self, flag: Flags, value: bool) {
        let mut flags = self.flags();
        flags.set(flag, value);
        self.set_flags(flags);
    }

    pub fn clear(&mut self) {
        self.cells = [Register::default(); REGISTER_COUNT];
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegisterId, u64)> + '_ {
        RegisterId::ALL
            .iter()
            .map(|id| (*id, self.cells[id.index()].raw()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn views_cover_expected_offsets() {
        assert_eq!(View::Byte5.bit_offset(), 40);
        assert_eq!(View::Half3.bit_offset(), 48);
        assert_eq!(View::Quarter1.bit_offset(), 32);
        assert_eq!(View::Full.bit_offset(), 0);
        assert_eq!(View::Half2.byte_offset(), 4);
        assert_eq!(View::from_nibble(15), None, "nibble 15 names no view");
    }

    #[test]
    fn narrow_write_preserves_neighbouring_bits() {
        let mut reg = Register::new(0x1122_3344_5566_7788);
        reg.write(View::Byte2, 0xAB);
        assert_eq!(reg.raw(), 0x1122_3344_55AB_7788);
        reg.write(View::Half3, 0xFFFF_CAFE);
        assert_eq!(reg.raw(), 0xCAFE_3344_55AB_7788, "value masked to 16 bits");
        reg.write(View::Quarter0, 0);
        assert_eq!(reg.raw(), 0xCAFE_3344_0000_0000);
    }

    #[test]
    fn increment_wraps_within_view() {
        let mut regs = RegisterFile::new();
        regs.write(RegisterId::C, View::Full, 0x0000_0000_0000_01FF);
        regs.increment(RegisterId::C, View::Byte0, 1);
        assert_eq!(regs.read(RegisterId::C, View::Byte0), 0);
        assert_eq!(
            regs.read(RegisterId::C, View::Byte1),
            0x01,
            "carry must not leak into byte1"
        );
        regs.decrement(RegisterId::C, View::Half0, 2);
        assert_eq!(regs.read(RegisterId::C, View::Half0), 0x00FE);
        regs.increment(RegisterId::C, View::Half0, -0xFF);
        assert_eq!(regs.read(RegisterId::C, View::Half0), 0xFFFF);
    }

    #[test]
    fn flag_projection_touches_single_bit() {
        let mut regs = RegisterFile::new();
        regs.set_flag(Flags::ZERO, true);
        regs.set_flag(Flags::RUNNING, true);
        assert!(regs.flag(Flags::ZERO));
        assert!(!regs.flag(Flags::CARRY));
        regs.set_flag(Flags::ZERO, false);
        assert_eq!(regs.flags(), Flags::RUNNING);
        assert_eq!(
            regs.read(RegisterId::Flags, View::Full),
            Flags::RUNNING.bits()
        );
    }

    #[test]
    fn byte_accessors_are_little_endian() {
        let mut reg = Register::default();
        reg.set_byte(0, 0x34);
        reg.set_byte(1, 0x12);
        assert_eq!(reg.read(View::Half0), 0x1234);
        assert_eq!(reg.byte(1), 0x12);
    }
}
