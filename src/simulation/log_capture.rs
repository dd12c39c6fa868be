//! Log capture for routing channel events to per-node log streams.
//!
//! This module provides a tee logger that forwards every record to the
//! regular `env_logger` output and, while an event is executing on the
//! simulation scheduler, also stores the record in a global buffer tagged
//! with the node context and the simulated time of that event.
//!
//! Records emitted outside of any scheduled event (setup, teardown) are
//! not captured.

use log::{Level, Log, Metadata, Record};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use super::scheduler::current_context;
use super::types::{NodeId, SimTime};

/// Maximum number of log entries to buffer before they're consumed.
const LOG_BUFFER_CAPACITY: usize = 10000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// A captured log entry with the node context it was emitted in.
#[derive(Debug, Clone)]
pub struct CapturedLogEntry {
    pub node_id: NodeId,
    pub timestamp: SimTime,
    pub content: String,
    pub level: LogLevel,
}

/// Global buffer for captured log entries.
static CAPTURED_LOGS: Mutex<Option<VecDeque<CapturedLogEntry>>> = Mutex::new(None);

fn buffer() -> MutexGuard<'static, Option<VecDeque<CapturedLogEntry>>> {
    // A panic while holding the lock leaves the buffer itself intact
    CAPTURED_LOGS.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Initialize the log capture buffer. Entries are only kept after this call.
pub fn init_log_capture() {
    *buffer() = Some(VecDeque::with_capacity(LOG_BUFFER_CAPACITY));
}

/// Drain all captured log entries from the buffer.
pub fn drain_captured_logs() -> Vec<CapturedLogEntry> {
    match buffer().as_mut() {
        Some(entries) => entries.drain(..).collect(),
        None => Vec::new(),
    }
}

/// Push a captured log entry, dropping the oldest one when full.
fn push_log_entry(entry: CapturedLogEntry) {
    if let Some(entries) = buffer().as_mut() {
        if entries.len() >= LOG_BUFFER_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(entry);
    }
}

/// Convert log::Level to our LogLevel enum.
fn convert_level(level: Level) -> LogLevel {
    match level {
        Level::Error => LogLevel::Error,
        Level::Warn => LogLevel::Warn,
        Level::Info => LogLevel::Info,
        Level::Debug => LogLevel::Debug,
        Level::Trace => LogLevel::Trace,
    }
}

/// Store `record` if it was emitted from inside a scheduled event.
fn capture(record: &Record) {
    if let Some((node_id, timestamp)) = current_context() {
        push_log_entry(CapturedLogEntry {
            node_id,
            timestamp,
            content: format!("{}", record.args()),
            level: convert_level(record.level()),
        });
    }
}

/// A tee logger that forwards to `env_logger` and captures records emitted in a node context.
pub struct TeeLogger {
    inner: env_logger::Logger,
}

impl TeeLogger {
    pub fn new(inner: env_logger::Logger) -> Self {
        Self { inner }
    }

    /// Get the maximum log level filter from the inner logger.
    pub fn filter(&self) -> log::LevelFilter {
        self.inner.filter()
    }
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        // Always forward to the inner logger first
        self.inner.log(record);

        if self.inner.matches(record) {
            capture(record);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}
