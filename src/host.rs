//! External collaborator contracts.
//!
//! The core consumes exactly one sink from its host: something that can
//! take a line of diagnostic text. Everything that would otherwise call an
//! ambient `println!` (bitmap/buddy/scheduler/IPC `print_stats`, registry
//! enumeration) takes a `&mut dyn PrintSink` instead, so swapping the
//! destination — a UART, a test buffer, a framebuffer console — never
//! touches subsystem code.

use alloc::string::String;
use alloc::vec::Vec;

/// A host-provided text sink. `print_line` receives one already-formatted
/// line at a time, with no trailing newline.
pub trait PrintSink {
    fn print_line(&mut self, text: &str);
}

/// A `PrintSink` that discards everything. Useful when a caller wants the
/// side effects of a `print_stats` call without the output, or in tests that
/// only care about return values.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PrintSink for NullSink {
    fn print_line(&mut self, _text: &str) {}
}

/// A `PrintSink` backed by an in-memory line buffer. This is what the
/// teacher's `Uart` is to a real serial port: a stand-in destination, here
/// used by tests and demos instead of hardware.
#[derive(Debug, Default, Clone)]
pub struct BufferSink {
    lines: Vec<String>,
}

impl BufferSink {
    pub fn new() -> Self {
        BufferSink { lines: Vec::new() }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl PrintSink for BufferSink {
    fn print_line(&mut self, text: &str) {
        self.lines.push(String::from(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sink_records_lines_in_order() {
        let mut sink = BufferSink::new();
        sink.print_line("first");
        sink.print_line("second");
        assert_eq!(sink.lines(), &["first", "second"]);
    }

    #[test]
    fn null_sink_drops_everything() {
        let mut sink = NullSink;
        sink.print_line("gone");
    }
}
