use std::fs::File;
use std::io::{Result as IoResult, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

static LOG_FILE: OnceLock<Arc<Mutex<File>>> = OnceLock::new();
static LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);
static RANK: AtomicUsize = AtomicUsize::new(0);

/// Verbosity level selected by the repeated `-v` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Info = 0,
    Debug = 1,
}

impl Level {
    /// Maps the `-v` occurrence count onto a level: 0 is INFO, 1+ is DEBUG.
    #[must_use]
    pub const fn from_verbosity(count: u8) -> Self {
        if count == 0 { Self::Info } else { Self::Debug }
    }
}

/// Sets the minimum level that will be emitted by [`log_debug`].
pub fn set_level(level: Level) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

fn current_level() -> Level {
    if LEVEL.load(Ordering::Relaxed) == Level::Debug as u8 {
        Level::Debug
    } else {
        Level::Info
    }
}

/// Records this process's rank so every logged line carries a `[rank N]` prefix in parallel
/// runs.
pub fn set_rank(rank: usize) {
    RANK.store(rank, Ordering::Relaxed);
}

/// Configures a log file for warnings/errors/info/debug emitted by the concatenator.
///
/// # Errors
///
/// Returns an error if the log file cannot be created.
pub fn set_log_file(path: &Path) -> IoResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    // Ignore error if already set; keep the first writer.
    let _ = LOG_FILE.set(Arc::new(Mutex::new(file)));
    Ok(())
}

fn emit(tag: &str, message: &str) {
    let rank = RANK.load(Ordering::Relaxed);
    let line = format!("[rank {rank}] {tag}: {message}");
    eprintln!("{line}");
    if let Some(writer) = LOG_FILE.get()
        && let Ok(mut file) = writer.lock()
    {
        let _ = writeln!(file, "{line}");
    }
}

pub fn log_info(message: &str) {
    emit("info", message);
}

pub fn log_debug(message: &str) {
    if current_level() >= Level::Debug {
        emit("debug", message);
    }
}

pub fn log_warn(message: &str) {
    emit("warning", message);
}

pub fn log_error(message: &str) {
    emit("error", message);
}
