mod common;

use hex_literal::hex;

use common::{boot, RecordingTracer};
use softcore::soc::core::{
    Core, CoreConfig, CoreError, DecodeError, Descriptor, Flags, Mode, Operation, ProgramBuilder,
    RegisterId, SyscallTable, TraceEvent, View, Width, UNHANDLED_SYSCALL,
};
use softcore::soc::device::{Device, DeviceAccess, Latch};
use softcore::soc::memory::Memory;

#[test]
fn push_then_pop_restores_value_and_stack_pointer() {
    let value = 0xDEAD_BEEF_0123_4567;
    let program = ProgramBuilder::new()
        .ld_imm(Width::Full, value, RegisterId::A, View::Full)
        .push(RegisterId::A, View::Full)
        .pop(RegisterId::B, View::Full)
        .halt()
        .build();
    let mut core = boot(&program);
    let top = core.machine().sp();
    core.run().expect("run");
    assert_eq!(core.registers().read(RegisterId::B, View::Full), value);
    assert_eq!(core.machine().sp(), top);
}

#[test]
fn call_then_ret_resumes_after_call() {
    let program = ProgramBuilder::new()
        .call_imm(0x40)
        .ld_imm(Width::Byte, 7, RegisterId::C, View::Byte0)
        .halt()
        .build();
    let mut core = boot(&program);
    let subroutine = ProgramBuilder::new().ret().build();
    core.memory_mut().write_bytes(0x40, &subroutine);
    let top = core.machine().sp();

    core.step().expect("call");
    assert_eq!(core.machine().pc(), 0x40);
    assert_eq!(core.machine().sp(), top - 4);
    core.step().expect("ret");
    assert_eq!(core.machine().pc(), 6, "opcode, descriptor and 4-byte target");
    assert_eq!(core.machine().sp(), top);

    core.run().expect("run");
    assert_eq!(core.registers().read(RegisterId::C, View::Byte0), 7);
}

#[test]
fn narrow_pop_takes_low_byte_of_pushed_half() {
    let program = ProgramBuilder::new()
        .push_imm(Width::Half, 0x1234)
        .pop(RegisterId::A, View::Half0)
        .push(RegisterId::A, View::Half0)
        .pop(RegisterId::B, View::Byte0)
        .halt()
        .build();
    let mut core = boot(&program);
    core.run().expect("run");
    assert_eq!(core.registers().read(RegisterId::A, View::Half0), 0x1234);
    assert_eq!(core.registers().read(RegisterId::B, View::Byte0), 0x34);
}

#[test]
fn unknown_opcode_stops_run_with_decode_error() {
    let program = ProgramBuilder::new().nop().raw(&[0xFF]).build();
    let mut core = boot(&program);
    let err = core.run().expect_err("0xFF is unassigned");
    let expected = CoreError::Decode {
        address: 1,
        source: DecodeError::UnknownOperation { opcode: 0xFF },
    };
    assert_eq!(err, expected);
    assert_eq!(core.take_fault(), Some(expected));
    assert!(core.last_fault().is_none(), "fault is handed over once");
    assert!(!core.is_running());
    assert!(!core.registers().flag(Flags::RUNNING));
    assert_eq!(core.machine().pc(), 1, "PC stays on the faulting byte");
}

#[test]
fn store_rejects_direct_modes() {
    let program = ProgramBuilder::new()
        .instruction(
            Mode::Register,
            Operation::St,
            &[
                Descriptor::register_view(RegisterId::A, View::Full),
                Descriptor::register_view(RegisterId::B, View::Full),
            ],
            None,
        )
        .build();
    let mut core = boot(&program);
    let err = core.run().expect_err("register-mode store");
    assert!(
        matches!(
            err,
            CoreError::Decode {
                source: DecodeError::UnsupportedMode {
                    operation: Operation::St,
                    mode: Mode::Register,
                },
                ..
            }
        ),
        "{err}"
    );
}

#[test]
fn descriptor_naming_view_fifteen_is_rejected() {
    let mut core = boot(&hex!("01 0F 00"));
    let err = core.run().expect_err("no view 15");
    assert!(
        matches!(
            err,
            CoreError::Decode {
                source: DecodeError::InvalidView { descriptor: 0x0F },
                ..
            }
        ),
        "{err}"
    );
}

#[test]
fn three_hundred_bytes_across_a_page_boundary() {
    let mut memory = Memory::new();
    let start = 0x1_0000 - 50;
    let data: Vec<u8> = (0..300u32).map(|i| (i * 7 + 3) as u8).collect();
    assert_eq!(memory.write_bytes(start, &data), 300);
    assert_eq!(memory.page_count(), 2);
    assert_eq!(memory.read_block(start, 300), data);
    assert_eq!(memory.page_count(), 2);
}

#[test]
fn hand_assembled_counting_loop() {
    // A.byte0 = 0; loop: INC A.byte0; CMP 5, A.byte0; JNZ loop; HALT
    let image = hex!(
        "41 00 00 00"
        "1E 00"
        "5C 00 00 05"
        "4A 02 04000000"
        "00"
    );
    let mut core = boot(&image);
    let summary = core.run().expect("run");
    assert_eq!(summary.steps, 1 + 5 * 3 + 1);
    assert_eq!(summary.pc, image.len() as u64);
    assert_eq!(core.registers().read(RegisterId::A, View::Byte0), 5);
    assert!(core.registers().flag(Flags::ZERO));
}

#[test]
fn byte_add_wraps_with_zero_and_overflow() {
    let program = ProgramBuilder::new()
        .ld_imm(Width::Byte, 0xFF, RegisterId::A, View::Byte1)
        .alu_imm(Operation::Add, Width::Byte, 1, RegisterId::A, View::Byte1)
        .halt()
        .build();
    let mut core = boot(&program);
    core.run().expect("run");
    let registers = core.registers();
    assert_eq!(registers.read(RegisterId::A, View::Full), 0);
    assert!(registers.flag(Flags::ZERO));
    assert!(registers.flag(Flags::OVERFLOW));
    assert!(registers.flag(Flags::CARRY));
}

#[test]
fn full_width_subtract_below_zero_sets_overflow() {
    let program = ProgramBuilder::new()
        .ld_imm(Width::Byte, 1, RegisterId::B, View::Full)
        .alu_imm(Operation::Sub, Width::Byte, 2, RegisterId::B, View::Full)
        .halt()
        .build();
    let mut core = boot(&program);
    core.run().expect("run");
    let registers = core.registers();
    assert_eq!(registers.read(RegisterId::B, View::Full), u64::MAX);
    assert!(registers.flag(Flags::OVERFLOW));
    assert!(!registers.flag(Flags::ZERO));
    assert!(registers.flag(Flags::SIGN));
}

#[test]
fn store_and_load_through_indirect_modes() {
    let value = 0x0102_0304_0506_0708;
    let program = ProgramBuilder::new()
        .ld_imm(Width::Quarter, 0x20FC, RegisterId::D, View::Quarter0)
        .ld_imm(Width::Full, value, RegisterId::A, View::Full)
        .st_ind(RegisterId::A, View::Full, RegisterId::D, View::Quarter0)
        .ld_ind(RegisterId::D, View::Quarter0, RegisterId::B, View::Full)
        .ld_abs(0x20FE, RegisterId::C, View::Half2)
        .st_abs(RegisterId::A, View::Byte7, 0x3000)
        .halt()
        .build();
    let mut core = boot(&program);
    core.run().expect("run");
    assert_eq!(core.registers().read(RegisterId::B, View::Full), value);
    assert_eq!(core.registers().read(RegisterId::C, View::Full), 0x0506_0000_0000);
    let memory = &mut core.machine_mut().memory;
    assert_eq!(memory.read_sized(0x20FC, Width::Full), value);
    assert_eq!(memory.read_byte(0x3000), 0x01);
    assert_eq!(memory.read_byte(0x3001), 0x00, "store is view-wide");
}

#[test]
fn register_indirect_jump_and_conditional_fallthrough() {
    let program = ProgramBuilder::new()
        .ld_imm(Width::Byte, 0x20, RegisterId::E, View::Byte0)
        .jump_reg(Operation::Jmp, RegisterId::E, View::Byte0)
        .build();
    let mut core = boot(&program);
    let tail = ProgramBuilder::new()
        .alu_imm(Operation::Test, Width::Byte, 0, RegisterId::E, View::Byte0)
        .jump_imm(Operation::Jnz, 0x80)
        .ld_imm(Width::Byte, 1, RegisterId::F, View::Byte0)
        .halt()
        .build();
    core.memory_mut().write_bytes(0x20, &tail);
    core.run().expect("run");
    assert_eq!(core.registers().read(RegisterId::F, View::Byte0), 1);
    assert!(core.registers().flag(Flags::ZERO));
}

#[test]
fn unregistered_syscall_returns_sentinel() {
    let program = ProgramBuilder::new().sys_imm(9).halt().build();
    let mut core = boot(&program);
    core.run().expect("run");
    assert_eq!(core.registers().read(RegisterId::A, View::Full), UNHANDLED_SYSCALL);
}

#[test]
fn syscall_can_halt_the_core() {
    let program = ProgramBuilder::new()
        .ld_imm(Width::Byte, 3, RegisterId::B, View::Byte0)
        .sys_imm(0)
        .ld_imm(Width::Byte, 0xAA, RegisterId::C, View::Byte0)
        .halt()
        .build();
    let mut core = boot(&program);
    core.syscalls_mut().register(0, |machine| {
        machine.request_halt();
        machine.syscall_args()[0]
    });
    let summary = core.run().expect("run");
    assert_eq!(summary.steps, 2);
    assert_eq!(core.registers().read(RegisterId::A, View::Full), 3);
    assert_eq!(core.registers().read(RegisterId::C, View::Byte0), 0);
}

struct WriteOnly;

impl Device for WriteOnly {
    fn name(&self) -> &str {
        "write-only"
    }

    fn set(&mut self, _value: u64, _access: DeviceAccess) {}
}

#[test]
fn input_from_write_only_device_reads_zero() {
    let program = ProgramBuilder::new()
        .ld_imm(Width::Byte, 0x55, RegisterId::A, View::Byte0)
        .in_imm(RegisterId::A, View::Byte0, 3)
        .halt()
        .build();
    let mut core = boot(&program);
    core.devices_mut().register(3, WriteOnly).expect("register");
    core.run().expect("run");
    assert_eq!(core.registers().read(RegisterId::A, View::Byte0), 0);
}

#[test]
fn tracer_sees_fetch_write_and_halt() {
    let program = ProgramBuilder::new()
        .ld_imm(Width::Byte, 9, RegisterId::A, View::Byte0)
        .alu_imm(Operation::Mul, Width::Byte, 3, RegisterId::A, View::Byte0)
        .halt()
        .build();
    let mut core = boot(&program);
    let tracer = RecordingTracer::default();
    core.set_tracer(Some(Box::new(tracer.clone())));
    core.run().expect("run");

    let events = tracer.events();
    let fetches = events
        .iter()
        .filter(|event| matches!(event, TraceEvent::Fetch { .. }))
        .count();
    assert_eq!(fetches, 3);
    assert!(events.contains(&TraceEvent::RegisterWrite {
        register: RegisterId::A,
        view: View::Byte0,
        value: 27,
    }));
    assert!(matches!(events.last(), Some(TraceEvent::Halt { address: 8 })));
}

#[test]
fn clear_zeroes_only_its_view() {
    let program = ProgramBuilder::new()
        .ld_imm(Width::Half, 0xFFFF, RegisterId::B, View::Half0)
        .clr(RegisterId::B, View::Byte0)
        .halt()
        .build();
    let mut core = boot(&program);
    core.run().expect("run");
    assert_eq!(core.registers().read(RegisterId::B, View::Full), 0xFF00);
}

/// Falls through to `A.byte0 = 1` or jumps to `A.byte0 = 2` at 0x40.
fn branch_program(operation: Operation) -> Vec<u8> {
    ProgramBuilder::new()
        .jump_imm(operation, 0x40)
        .ld_imm(Width::Byte, 1, RegisterId::A, View::Byte0)
        .halt()
        .build()
}

fn run_branch(operation: Operation, flag: Flags, state: bool) -> u64 {
    let mut core = boot(&branch_program(operation));
    let target = ProgramBuilder::new()
        .ld_imm(Width::Byte, 2, RegisterId::A, View::Byte0)
        .halt()
        .build();
    core.memory_mut().write_bytes(0x40, &target);
    core.registers_mut().set_flag(flag, state);
    core.run().expect("run");
    core.registers().read(RegisterId::A, View::Byte0)
}

#[test]
fn each_conditional_jump_tests_its_flag() {
    let table = [
        (Operation::Jz, Flags::ZERO, true),
        (Operation::Jnz, Flags::ZERO, false),
        (Operation::Jn, Flags::NEGATIVE, true),
        (Operation::Jnn, Flags::NEGATIVE, false),
        (Operation::Jo, Flags::OVERFLOW, true),
        (Operation::Jno, Flags::OVERFLOW, false),
        (Operation::Jc, Flags::CARRY, true),
        (Operation::Jnc, Flags::CARRY, false),
    ];
    for (operation, flag, taken_when) in table {
        assert_eq!(operation.condition(), Some((flag, taken_when)));
        assert_eq!(run_branch(operation, flag, taken_when), 2, "{operation} taken");
        assert_eq!(run_branch(operation, flag, !taken_when), 1, "{operation} not taken");
    }
}

#[test]
fn carry_from_byte_add_drives_jc() {
    let mut core = boot(
        &ProgramBuilder::new()
            .ld_imm(Width::Byte, 0xFF, RegisterId::A, View::Byte0)
            .alu_imm(Operation::Add, Width::Byte, 1, RegisterId::A, View::Byte0)
            .jump_imm(Operation::Jc, 0x80)
            .halt()
            .build(),
    );
    let target = ProgramBuilder::new()
        .ld_imm(Width::Byte, 0x77, RegisterId::B, View::Byte0)
        .halt()
        .build();
    core.memory_mut().write_bytes(0x80, &target);
    core.run().expect("run");
    assert_eq!(core.registers().read(RegisterId::B, View::Byte0), 0x77);
}

#[test]
fn shift_instructions_report_lost_bits() {
    let program = ProgramBuilder::new()
        .ld_imm(Width::Byte, 0x81, RegisterId::C, View::Byte0)
        .alu_imm(Operation::Shl, Width::Byte, 1, RegisterId::C, View::Byte0)
        .alu_imm(Operation::Shr, Width::Byte, 1, RegisterId::C, View::Byte0)
        .halt()
        .build();
    let mut core = boot(&program);
    core.step().expect("load");
    core.step().expect("shl");
    assert_eq!(core.registers().read(RegisterId::C, View::Byte0), 0x02);
    assert!(core.registers().flag(Flags::OVERFLOW), "bit 7 shifted out");
    assert!(core.registers().flag(Flags::CARRY));
    core.step().expect("shr");
    assert_eq!(core.registers().read(RegisterId::C, View::Byte0), 0x01);
    assert!(!core.registers().flag(Flags::OVERFLOW), "only a zero bit left");
    core.run().expect("run");
    assert_eq!(core.registers().read(RegisterId::C, View::Full), 0x01);
}

#[test]
fn syscall_id_from_register() {
    let program = ProgramBuilder::new()
        .ld_imm(Width::Byte, 5, RegisterId::D, View::Byte0)
        .sys(RegisterId::D, View::Byte0)
        .halt()
        .build();
    let mut syscalls = SyscallTable::new();
    syscalls.register(5, |_machine| 0x77);
    let mut core = Core::with_syscalls(CoreConfig::default(), syscalls);
    core.memory_mut().write_bytes(0, &program);
    core.power_on();
    core.run().expect("run");
    assert_eq!(core.registers().read(RegisterId::A, View::Full), 0x77);
}

#[test]
fn push_reads_eight_bytes_through_indirect_modes() {
    let first = 0x1122_3344_5566_7788;
    let second = 0x99AA_BBCC_DDEE_FF00;
    let program = ProgramBuilder::new()
        .instruction(
            Mode::ImmediateIndirect,
            Operation::Push,
            &[Descriptor::immediate(Width::Full)],
            Some((Width::Full, 0x5FC)),
        )
        .pop(RegisterId::A, View::Full)
        .ld_imm(Width::Quarter, 0x800, RegisterId::E, View::Quarter0)
        .instruction(
            Mode::RegisterIndirect,
            Operation::Push,
            &[Descriptor::register_view(RegisterId::E, View::Quarter0)],
            None,
        )
        .pop(RegisterId::B, View::Full)
        .halt()
        .build();
    let mut core = boot(&program);
    core.memory_mut().write_u64(0x5FC, first);
    core.memory_mut().write_u64(0x800, second);
    let top = core.machine().sp();
    core.run().expect("run");
    assert_eq!(core.registers().read(RegisterId::A, View::Full), first);
    assert_eq!(core.registers().read(RegisterId::B, View::Full), second);
    assert_eq!(core.machine().sp(), top);
}

#[test]
fn call_through_register_and_memory() {
    let builder = ProgramBuilder::new().ld_imm(Width::Byte, 0x40, RegisterId::E, View::Byte0);
    let builder = builder.jump_reg(Operation::Call, RegisterId::E, View::Byte0);
    let builder = builder.instruction(
        Mode::ImmediateIndirect,
        Operation::Call,
        &[Descriptor::immediate(Width::Full)],
        Some((Width::Full, 0x300)),
    );
    let halt_at = builder.len() as u64;
    let program = builder.halt().build();

    let mut core = boot(&program);
    let add_one = ProgramBuilder::new()
        .alu_imm(Operation::Add, Width::Byte, 1, RegisterId::A, View::Byte0)
        .ret()
        .build();
    let add_sixteen = ProgramBuilder::new()
        .alu_imm(Operation::Add, Width::Byte, 0x10, RegisterId::A, View::Byte0)
        .ret()
        .build();
    core.memory_mut().write_bytes(0x40, &add_one);
    core.memory_mut().write_bytes(0x60, &add_sixteen);
    core.memory_mut().write_u32(0x300, 0x60);
    let top = core.machine().sp();

    let summary = core.run().expect("run");
    assert_eq!(core.registers().read(RegisterId::A, View::Byte0), 0x11);
    assert_eq!(core.machine().sp(), top);
    assert_eq!(summary.pc, halt_at + 1);
}

#[test]
fn device_ids_from_register_and_memory() {
    let program = ProgramBuilder::new()
        .ld_imm(Width::Half, 0x0102, RegisterId::F, View::Half0)
        .ld_imm(Width::Quarter, 0x700, RegisterId::G, View::Quarter0)
        .ld_imm(Width::Byte, 0x5A, RegisterId::A, View::Byte0)
        .instruction(
            Mode::Register,
            Operation::Out,
            &[
                Descriptor::register_view(RegisterId::A, View::Byte0),
                Descriptor::register_view(RegisterId::F, View::Half0),
            ],
            None,
        )
        .ld_imm(Width::Byte, 0x6B, RegisterId::A, View::Byte0)
        .instruction(
            Mode::RegisterIndirect,
            Operation::Out,
            &[
                Descriptor::register_view(RegisterId::A, View::Byte0),
                Descriptor::register_view(RegisterId::G, View::Quarter0),
            ],
            None,
        )
        .instruction(
            Mode::ImmediateIndirect,
            Operation::In,
            &[
                Descriptor::register_view(RegisterId::B, View::Byte0),
                Descriptor::immediate(Width::Full),
            ],
            Some((Width::Full, 0x700)),
        )
        .halt()
        .build();
    let mut core = boot(&program);
    core.memory_mut().write_u16(0x700, 0x0102);
    let latch = Latch::new("latch");
    let probe = latch.probe();
    core.devices_mut().register(0x0102, latch).expect("register latch");
    core.run().expect("run");
    assert_eq!(probe.history(), vec![0x5A, 0x6B]);
    assert_eq!(core.registers().read(RegisterId::B, View::Byte0), 0x6B);
}
