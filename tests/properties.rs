use proptest::prelude::*;

use softcore::soc::core::{RegisterFile, RegisterId, View, Width};
use softcore::soc::memory::{Memory, PAGE_SIZE};

fn register() -> impl Strategy<Value = RegisterId> {
    prop::sample::select(RegisterId::ALL.to_vec())
}

fn view() -> impl Strategy<Value = View> {
    prop::sample::select(View::ALL.to_vec())
}

fn width() -> impl Strategy<Value = Width> {
    prop::sample::select(Width::ALL.to_vec())
}

/// Addresses clustered around page boundaries so straddling accesses are common.
fn address() -> impl Strategy<Value = u64> {
    (0u64..64, 0usize..16).prop_map(|(page, back)| {
        (page * PAGE_SIZE as u64).wrapping_sub(back as u64)
    })
}

proptest! {
    #[test]
    fn view_write_masks_and_preserves_other_bits(
        id in register(),
        view in view(),
        seed in any::<u64>(),
        value in any::<u64>(),
    ) {
        let mut registers = RegisterFile::new();
        registers.write(id, View::Full, seed);
        registers.write(id, view, value);
        prop_assert_eq!(registers.read(id, view), value & view.width().mask());
        let outside = !view.span_mask();
        prop_assert_eq!(registers.read(id, View::Full) & outside, seed & outside);
    }

    #[test]
    fn sized_memory_round_trip(address in address(), width in width(), value in any::<u64>()) {
        let mut memory = Memory::new();
        memory.write_sized(address, width, value);
        prop_assert_eq!(memory.read_sized(address, width), value & width.mask());
        let expected = value.to_le_bytes();
        prop_assert_eq!(memory.read_block(address, width.bytes()), expected[..width.bytes()].to_vec());
    }

    #[test]
    fn untouched_memory_reads_zero(address in any::<u64>(), len in 1usize..600) {
        let mut memory = Memory::new();
        prop_assert!(memory.read_block(address, len).iter().all(|byte| *byte == 0));
    }
}
