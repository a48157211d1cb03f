//! Kernel log sink.
//!
//! Forwards `log` crate records to whatever console the tty collaborator
//! installs. The core subsystems never print directly; they go through
//! `log::{trace,debug,info,warn,error}!` like the rest of the pack, so a
//! headless test build can swap the sink without touching call sites.

use core::fmt::Write;
use log::{Level, Metadata, Record};
use spin::Mutex;

/// Minimal line-buffered sink. Real consoles (serial UART, framebuffer text)
/// are wired in by calling [`set_writer`] with a `'static` `Write`
/// implementor at boot; until then, log records are dropped.
pub trait ConsoleWriter: Write + Send {}
impl<T: Write + Send> ConsoleWriter for T {}

static SINK: Mutex<Option<&'static mut dyn ConsoleWriter>> = Mutex::new(None);

struct KernelLogger;

impl log::Log for KernelLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let mut sink = SINK.lock();
            if let Some(writer) = sink.as_mut() {
                let _ = writeln!(writer, "[{:<5}] {}", record.level(), record.args());
            }
        }
    }

    fn flush(&self) {}
}

static LOGGER: KernelLogger = KernelLogger;

/// Install the global logger. Call once at boot, before anything logs.
pub fn init(level: Level) {
    log::set_logger(&LOGGER).ok();
    log::set_max_level(level.to_level_filter());
}

/// Point the logger at a real console. Safety: caller must ensure `writer`
/// outlives every subsequent log call, which in practice means a `'static`
/// sink installed once during boot and never replaced again.
pub fn set_writer(writer: &'static mut dyn ConsoleWriter) {
    *SINK.lock() = Some(writer);
}
