//! Runs a raw program image on a single core.
//!
//! Syscall `0` halts with the exit code in `B`; syscall `1` writes `D` bytes
//! starting at address `C` to stdout.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use softcore::loader;
use softcore::soc::core::{Core, CoreConfig, MachineState, PipelinePrinter, DEFAULT_STACK_TOP};

const SYS_EXIT: u8 = 0;
const SYS_WRITE: u8 = 1;

#[derive(Debug, Parser)]
#[command(about = "Execute a raw softcore image until it halts")]
struct Args {
    /// Raw binary image.
    image: PathBuf,

    /// Address the image is loaded at.
    #[arg(long, default_value_t = 0, value_parser = parse_number)]
    load: u64,

    /// Initial program counter. Defaults to the load address.
    #[arg(long, value_parser = parse_number)]
    entry: Option<u64>,

    #[arg(long, default_value_t = DEFAULT_STACK_TOP, value_parser = parse_number)]
    stack_top: u64,

    /// Stop after at most N instructions.
    #[arg(long)]
    max_steps: Option<u64>,

    /// Print a pipeline trace of every step to stdout.
    #[arg(long)]
    trace: bool,
}

/// Accepts decimal or `0x`-prefixed hexadecimal.
fn parse_number(text: &str) -> Result<u64, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => text.replace('_', "").parse(),
    };
    parsed.map_err(|err| format!("invalid number '{text}': {err}"))
}

fn install_syscalls(core: &mut Core) {
    let syscalls = core.syscalls_mut();
    syscalls.register(SYS_EXIT, |machine: &mut MachineState| {
        let [code, _, _] = machine.syscall_args();
        tracing::info!(code, "program requested exit");
        machine.request_halt();
        code
    });
    syscalls.register(SYS_WRITE, |machine: &mut MachineState| {
        let [_, address, length] = machine.syscall_args();
        let bytes = machine.memory.read_block(address, length as usize);
        let mut stdout = io::stdout().lock();
        match stdout.write_all(&bytes).and_then(|()| stdout.flush()) {
            Ok(()) => bytes.len() as u64,
            Err(err) => {
                tracing::warn!("write syscall failed: {err}");
                0
            }
        }
    });
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = CoreConfig::new()
        .load_address(args.load)
        .entry(args.entry.unwrap_or(args.load))
        .stack_top(args.stack_top);

    let mut core = Core::new(config);
    loader::load_image(core.memory_mut(), config.load_address, &args.image)
        .with_context(|| format!("loading {}", args.image.display()))?;
    install_syscalls(&mut core);
    if args.trace {
        core.set_tracer(Some(Box::new(PipelinePrinter::stdout())));
    }

    core.power_on();
    let summary = match args.max_steps {
        Some(limit) => core.run_bounded(limit),
        None => core.run(),
    }
    .context("core stopped on a fault")?;

    for (register, value) in core.registers().iter() {
        println!("{register:>5} = 0x{value:016X}");
    }
    println!("steps = {} pc = 0x{:08X}", summary.steps, summary.pc);
    if !summary.halted {
        bail!("step limit reached before the program halted");
    }
    Ok(())
}
