//! Logging pipeline for the build driver.
//!
//! # Architecture
//!
//! ```text
//! log::info!/warn!/...           tool output (target "tool")
//!         |                               |
//!   [LogCollector] ------------------------+
//!     |                 |
//!     v                 v
//!  stderr           <build_dir>/logs/build_<ts>.log
//! (driver messages, (everything, timestamped)
//!  tool lines raw)
//! ```
//!
//! The log file defaults to `<build_dir>/logs/build_<ts>.log`.
//! Installation is idempotent: a second `init_logging` finds a logger already set and
//! leaves it in place.

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::orchestrator::executor::TOOL_LOG_TARGET;

/// `log::Log` implementation writing to stderr and, optionally, a session log file.
pub struct LogCollector {
    level: LevelFilter,
    file: Option<Mutex<File>>,
    log_path: Option<PathBuf>,
}

impl LogCollector {
    /// Create a collector; with `log_file`, lines are also appended to that file.
    pub fn new(level: LevelFilter, log_file: Option<&Path>) -> io::Result<Self> {
        let file = match log_file {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                Some(Mutex::new(
                    OpenOptions::new().create(true).append(true).open(path)?,
                ))
            }
            None => None,
        };
        Ok(LogCollector {
            level,
            file,
            log_path: log_file.map(Path::to_path_buf),
        })
    }

    /// Session log file, when one was opened.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    fn write_file(&self, line: &str) {
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = writeln!(file, "{}", line);
            }
        }
    }
}

/// Fresh timestamped session log path inside `log_dir`.
pub fn session_log_path(log_dir: &Path) -> PathBuf {
    log_dir.join(format!("build_{}.log", Local::now().format("%Y%m%d_%H%M%S")))
}

/// Timestamped line as written to the log file.
pub fn format_record(level: Level, target: &str, message: &str) -> String {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    if target == TOOL_LOG_TARGET {
        format!("[{}] [tool] {}", timestamp, message)
    } else {
        format!("[{}] [{}] {}", timestamp, level, message)
    }
}

impl Log for LogCollector {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = record.args().to_string();

        // Tool output is shown as the tool printed it
        if record.target() == TOOL_LOG_TARGET {
            eprintln!("{}", message);
        } else {
            eprintln!("[{}] {}", record.level(), message);
        }
        self.write_file(&format_record(record.level(), record.target(), &message));
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
    }
}

/// Install the collector as the global logger.
///
/// Returns the log file path, or `None` if no file was requested or a logger was already
/// installed.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> io::Result<Option<PathBuf>> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let collector = LogCollector::new(level, log_file)?;
    let path = collector.log_path().map(Path::to_path_buf);

    match log::set_boxed_logger(Box::new(collector)) {
        Ok(()) => {
            log::set_max_level(level);
            Ok(path)
        }
        Err(_) => Ok(None),
    }
}
