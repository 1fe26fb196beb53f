// Ring-buffer log sink for the disk layer
//
// Records go through the `log` facade. When no other sink is installed,
// `init()` routes them here so early-boot scans can be inspected later.

use alloc::collections::VecDeque;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Mutex;

pub const MAX_LOG_ENTRIES: usize = 64;

/// A retained log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
}

pub struct RingLogger {
    entries: Mutex<VecDeque<LogEntry>>,
    total: AtomicUsize,
}

impl RingLogger {
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            total: AtomicUsize::new(0),
        }
    }

    /// Copy out the retained lines, oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Number of records ever seen, including ones already rotated out.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn push(&self, entry: LogEntry) {
        self.total.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.lock();
        if entries.len() == MAX_LOG_ENTRIES {
            entries.pop_front();
        }
        entries.push_back(entry);
    }
}

impl Log for RingLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.push(LogEntry {
            level: record.level(),
            message: format!("{}", record.args()),
        });
    }

    fn flush(&self) {}
}

static LOGGER: RingLogger = RingLogger::new();

/// Install the ring logger as the global `log` sink.
///
/// Returns false if another sink was installed first; records then go there
/// and `snapshot()` stays empty.
pub fn init(level: LevelFilter) -> bool {
    if log::set_logger(&LOGGER).is_err() {
        return false;
    }
    log::set_max_level(level);
    true
}

pub fn snapshot() -> Vec<LogEntry> {
    LOGGER.snapshot()
}

pub fn log_count() -> usize {
    LOGGER.total().min(MAX_LOG_ENTRIES)
}
