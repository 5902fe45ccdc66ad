//! Logger bootstrap.
//!
//! Library crates only talk to the `log` facade. The binary starts one
//! `flexi_logger` backend: stderr by default, plus a rotating file when a log
//! directory is given. An explicit `--log-level` wins over `RUST_LOG`.

use std::path::Path;

use flexi_logger::{
    Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming, WriteMode,
};

const LOG_FILE_BASENAME: &str = "fieldmerge";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const DEFAULT_LEVEL: &str = "warn";

/// Normalize a level name; `warning` is accepted as `warn`.
pub fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" => Ok("off"),
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(format!(
            "unsupported log level `{other}`; expected off|trace|debug|info|warn|error"
        )),
    }
}

/// Start logging. Keep the returned handle alive for the process lifetime.
pub fn init_logging(level: Option<&str>, log_dir: Option<&Path>) -> Result<LoggerHandle, String> {
    let logger = match level {
        Some(level) => Logger::try_with_str(normalize_level(level)?),
        None => Logger::try_with_env_or_str(DEFAULT_LEVEL),
    }
    .map_err(|err| format!("invalid log specification: {err}"))?;

    let logger = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|err| {
                format!("failed to create log directory `{}`: {err}", dir.display())
            })?;
            logger
                .log_to_file(FileSpec::default().directory(dir).basename(LOG_FILE_BASENAME))
                .rotate(
                    Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                    Naming::Numbers,
                    Cleanup::KeepLogFiles(MAX_LOG_FILES),
                )
                .append()
                .duplicate_to_stderr(Duplicate::Warn)
                .format_for_files(flexi_logger::detailed_format)
                .format_for_stderr(flexi_logger::default_format)
                .write_mode(WriteMode::BufferAndFlush)
        }
        None => logger
            .log_to_stderr()
            .format_for_stderr(flexi_logger::default_format),
    };

    logger
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))
}
