use std::fmt;
use std::io::Write;

use smallvec::SmallVec;

use crate::soc::core::decode::Operation;
use crate::soc::core::flags::Flags;
use crate::soc::core::register::{RegisterId, View, Width};

/// Events emitted while stepping so tooling can build pipeline-style traces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Fetch {
        address: u64,
        opcode: u8,
        operation: Operation,
        descriptors: SmallVec<[u8; 2]>,
    },
    RegisterWrite {
        register: RegisterId,
        view: View,
        value: u64,
    },
    MemoryWrite {
        address: u64,
        width: Width,
        value: u64,
    },
    AluOp {
        operation: Operation,
        width: Width,
        left: u64,
        right: u64,
        result: u64,
        flags: Flags,
    },
    DeviceOut {
        id: u16,
        value: u64,
    },
    DeviceIn {
        id: u16,
        value: u64,
    },
    Syscall {
        id: u8,
        result: u64,
    },
    Halt {
        address: u64,
    },
}

/// Consumers implement this trait to receive execution trace events.
pub trait ExecutionTracer: Send {
    fn on_event(&mut self, event: TraceEvent);
}

/// Simple tracer that prints events using a pipeline-like layout.
pub struct PipelinePrinter<W: Write> {
    writer: W,
}

impl<W: Write> PipelinePrinter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn writeln(&mut self, line: fmt::Arguments<'_>) {
        let _ = writeln!(self.writer, "{line}");
    }
}

impl PipelinePrinter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ExecutionTracer for PipelinePrinter<W> {
    fn on_event(&mut self, event: TraceEvent) {
        match event {
            TraceEvent::Fetch {
                address,
                opcode,
                operation,
                descriptors,
            } => {
                let operands: Vec<String> =
                    descriptors.iter().map(|d| format!("{d:02X}")).collect();
                self.writeln(format_args!(
                    "[Fetch] 0x{address:08X} {opcode:02X} {operation:<4} {}",
                    operands.join(" ")
                ))
            }
            TraceEvent::RegisterWrite {
                register,
                view,
                value,
            } => self.writeln(format_args!(
                "[Write]   {register}.{view} <- {}",
                format_value(value, view.width())
            )),
            TraceEvent::MemoryWrite {
                address,
                width,
                value,
            } => self.writeln(format_args!(
                "[Store]   [0x{address:08X}] <- {}",
                format_value(value, width)
            )),
            TraceEvent::AluOp {
                operation,
                width,
                left,
                right,
                result,
                flags,
            } => self.writeln(format_args!(
                "[AluOp]   {} {operation} {} = {} {flags:?}",
                format_value(left, width),
                format_value(right, width),
                format_value(result, width)
            )),
            TraceEvent::DeviceOut { id, value } => {
                self.writeln(format_args!("[  Out]   dev 0x{id:04X} <- 0x{value:X}"))
            }
            TraceEvent::DeviceIn { id, value } => {
                self.writeln(format_args!("[   In]   dev 0x{id:04X} -> 0x{value:X}"))
            }
            TraceEvent::Syscall { id, result } => {
                self.writeln(format_args!("[  Sys]   #{id} -> 0x{result:X}"))
            }
            TraceEvent::Halt { address } => {
                self.writeln(format_args!("[ Halt] 0x{address:08X}"))
            }
        }
    }
}

fn format_value(value: u64, width: Width) -> String {
    let digits = width.bytes() * 2;
    format!("0x{:0digits$X}", value & width.mask())
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn printer_pads_values_to_width() {
        let mut printer = PipelinePrinter::new(Vec::new());
        printer.on_event(TraceEvent::RegisterWrite {
            register: RegisterId::B,
            view: View::Half1,
            value: 0x42,
        });
        printer.on_event(TraceEvent::Fetch {
            address: 0x10,
            opcode: 0x41,
            operation: Operation::Ld,
            descriptors: smallvec![0x01, 0x0E],
        });
        let text = String::from_utf8(printer.into_inner()).expect("utf8");
        assert!(text.contains("B.half1 <- 0x0042"), "{text}");
        assert!(text.contains("[Fetch] 0x00000010 41 LD   01 0E"), "{text}");
    }
}
