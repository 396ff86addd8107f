//! Routing `tracing` events to the browser console.
//!
//! [`init`] installs a `tracing-subscriber` fmt subscriber whose writer
//! sends each formatted event to the `console` method matching its
//! level, so warnings show up as warnings in devtools. Timestamps are
//! left to the console.

use std::io;
use std::sync::Once;

use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

/// Level used by the worker entry point and [`WarpWorker`](crate::WarpWorker).
pub const DEFAULT_LOG_LEVEL: Level = Level::INFO;

static INIT: Once = Once::new();

/// Install the console subscriber.
///
/// Only the first call has an effect. If the host page already set a
/// global subscriber, that one stays in place.
pub fn init(max_level: Level) {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(max_level)
            .with_ansi(false)
            .without_time()
            .with_writer(MakeConsoleWriter)
            .try_init();
    });
}

/// Console method an event is written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleMethod {
    Error,
    Warn,
    Info,
    Debug,
}

impl ConsoleMethod {
    /// Method for events at `level`.
    #[must_use]
    pub fn for_level(level: Level) -> Self {
        match level {
            Level::ERROR => Self::Error,
            Level::WARN => Self::Warn,
            Level::INFO => Self::Info,
            _ => Self::Debug,
        }
    }

    fn emit(self, line: &str) {
        let value = wasm_bindgen::JsValue::from_str(line);
        match self {
            Self::Error => web_sys::console::error_1(&value),
            Self::Warn => web_sys::console::warn_1(&value),
            Self::Info => web_sys::console::info_1(&value),
            Self::Debug => web_sys::console::debug_1(&value),
        }
    }
}

/// [`MakeWriter`] handing out one [`ConsoleWriter`] per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeConsoleWriter;

impl<'a> MakeWriter<'a> for MakeConsoleWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter::new(ConsoleMethod::Info)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        ConsoleWriter::new(ConsoleMethod::for_level(*meta.level()))
    }
}

/// Buffers one formatted event and writes it to the console on drop.
#[derive(Debug)]
pub struct ConsoleWriter {
    method: ConsoleMethod,
    buffer: Vec<u8>,
}

impl ConsoleWriter {
    const fn new(method: ConsoleMethod) -> Self {
        Self {
            method,
            buffer: Vec::new(),
        }
    }

    /// The buffered text without its trailing newline.
    fn line(&self) -> String {
        String::from_utf8_lossy(&self.buffer).trim_end().to_owned()
    }
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            self.method.emit(&self.line());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn levels_map_to_console_methods() {
        assert_eq!(ConsoleMethod::for_level(Level::ERROR), ConsoleMethod::Error);
        assert_eq!(ConsoleMethod::for_level(Level::WARN), ConsoleMethod::Warn);
        assert_eq!(ConsoleMethod::for_level(Level::INFO), ConsoleMethod::Info);
        assert_eq!(ConsoleMethod::for_level(Level::DEBUG), ConsoleMethod::Debug);
        assert_eq!(ConsoleMethod::for_level(Level::TRACE), ConsoleMethod::Debug);
    }

    #[test]
    fn writer_collects_one_line() {
        let mut writer = ConsoleWriter::new(ConsoleMethod::Warn);
        write!(writer, " WARN facewarp_io: worker failed").unwrap();
        writer.write_all(b", falling back\n").unwrap();
        assert_eq!(writer.line(), " WARN facewarp_io: worker failed, falling back");
        // Dropping would call into the browser console.
        writer.buffer.clear();
    }
}
