//! Host-pluggable logging.
//!
//! The core never prints. A frontend that wants visibility into guest faults
//! (out-of-range accesses, unknown opcodes, dropped samples) installs a
//! [`LogSink`] once; until then every log site is a cheap branch on
//! [`has_log_sink`].

use std::fmt;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Trace,
    Warn,
}

pub trait LogSink: Send + Sync + 'static {
    fn log(&self, level: Level, target: &'static str, args: fmt::Arguments);
}

static LOG_SINK: OnceLock<Box<dyn LogSink>> = OnceLock::new();

pub fn try_set_log_sink(sink: Box<dyn LogSink>) -> Result<(), Box<dyn LogSink>> {
    LOG_SINK.set(sink)
}

pub fn has_log_sink() -> bool {
    LOG_SINK.get().is_some()
}

pub(crate) fn emit(level: Level, target: &'static str, args: fmt::Arguments) {
    if let Some(sink) = LOG_SINK.get() {
        sink.log(level, target, args);
    }
}
