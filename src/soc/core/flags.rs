use bitflags::bitflags;

bitflags! {
    /// Bit assignments inside the flags register.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u64 {
        const CARRY             = 1 << 0;
        const NEGATIVE          = 1 << 1;
        const OVERFLOW          = 1 << 2;
        const PARITY            = 1 << 3;
        const ZERO              = 1 << 4;
        const SIGN              = 1 << 5;
        const RESERVED          = 1 << 6;
        const PRIVILEGE         = 1 << 7;
        const INTERRUPT_ENABLED = 1 << 8;
        const INTERRUPT_PENDING = 1 << 9;
        const RUNNING           = 1 << 10;
    }
}

impl Flags {
    /// Flags an ALU operation owns; everything else survives a computation.
    pub const ARITHMETIC: Flags = Flags::CARRY
        .union(Flags::NEGATIVE)
        .union(Flags::OVERFLOW)
        .union(Flags::PARITY)
        .union(Flags::ZERO)
        .union(Flags::SIGN);
}
