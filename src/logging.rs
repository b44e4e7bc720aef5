use std::any::Any;
use std::path::{Path, PathBuf};

pub const LOG_FILE_BASENAME: &str = "todo-desk";
pub const LOG_FILE_SUFFIX: &str = "log";
pub const LOG_ROTATE_SIZE_BYTES: u64 = 100 * 1024 * 1024;
pub const LOG_ROTATE_KEEP_FILES: usize = 30;
pub const LOG_SPEC_ENV: &str = "TODO_DESK_LOG";
pub const LOG_DIR: &str = "logs";

/// Rotated log files are kept apart from tasks.json/config.json so exports
/// and imports of the data directory never pick them up.
pub fn log_directory(data_dir: &Path) -> PathBuf {
    data_dir.join(LOG_DIR)
}

/// Picks the filter spec: `TODO_DESK_LOG`, then `RUST_LOG`, then the built-in default.
pub fn log_spec(app_var: Option<String>, rust_log: Option<String>) -> String {
    let default_spec = if cfg!(debug_assertions) {
        "warn,todo_desk_lib=debug"
    } else {
        "warn,todo_desk_lib=info"
    };
    app_var
        .filter(|value| !value.trim().is_empty())
        .or_else(|| rust_log.filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| default_spec.to_string())
}

/// Starts the file logger. Keep the returned handle alive until exit so
/// buffered lines get flushed.
#[cfg(feature = "cli")]
pub fn init_logging(
    data_dir: &Path,
) -> Result<flexi_logger::LoggerHandle, flexi_logger::FlexiLoggerError> {
    use flexi_logger::{
        detailed_format, Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming, WriteMode,
    };

    let log_dir = log_directory(data_dir);
    std::fs::create_dir_all(&log_dir)?;

    let spec = log_spec(
        std::env::var(LOG_SPEC_ENV).ok(),
        std::env::var("RUST_LOG").ok(),
    );

    let handle = Logger::try_with_str(spec)?
        .log_to_file(
            FileSpec::default()
                .directory(&log_dir)
                .basename(LOG_FILE_BASENAME)
                .suffix(LOG_FILE_SUFFIX),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .format_for_files(detailed_format)
        .rotate(
            Criterion::Size(LOG_ROTATE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(LOG_ROTATE_KEEP_FILES),
        )
        // stdout carries command output; problems go to stderr.
        .duplicate_to_stderr(Duplicate::Warn)
        .start()?;

    install_panic_hook();

    log::info!(
        "logger initialized dir={} rotate_size_bytes={} keep_files={}",
        log_dir.display(),
        LOG_ROTATE_SIZE_BYTES,
        LOG_ROTATE_KEEP_FILES
    );
    Ok(handle)
}

/// Text carried by a panic, for the two payload types `panic!` produces.
#[cfg_attr(not(feature = "cli"), allow(dead_code))]
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<opaque payload>"
    }
}

#[cfg(feature = "cli")]
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info: &std::panic::PanicHookInfo<'_>| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_default();
        log::error!(
            "panic message={} location={location}\n{}",
            panic_message(info.payload()),
            std::backtrace::Backtrace::capture()
        );
        previous(info);
    }));
}
