//! Structured logging setup: console + rolling daily file layer.

use std::fs;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How many daily log files survive a prune.
const MAX_LOG_FILES: usize = 14;

/// Platform log directory, resolvable before Tauri hands out an app handle.
pub fn get_log_dir() -> PathBuf {
    let base = std::env::var("LOCALAPPDATA")
        .or_else(|_| std::env::var("XDG_DATA_HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            #[cfg(target_os = "windows")]
            {
                PathBuf::from(std::env::var("USERPROFILE").unwrap_or_else(|_| ".".into()))
                    .join("AppData")
                    .join("Local")
            }
            #[cfg(not(target_os = "windows"))]
            {
                PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()))
                    .join(".local")
                    .join("share")
            }
        });
    base.join("app.cafecounter.terminal").join("logs")
}

/// Delete all but the most recent daily log files.
pub fn prune_old_logs() {
    let log_dir = get_log_dir();
    if !log_dir.exists() {
        return;
    }

    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
    if let Ok(entries) = fs::read_dir(&log_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with("cafe.") || name == "cafe.log" {
                    let modified = entry
                        .metadata()
                        .ok()
                        .and_then(|m| m.modified().ok())
                        .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
                    log_files.push((path, modified));
                }
            }
        }
    }

    if log_files.len() <= MAX_LOG_FILES {
        return;
    }
    log_files.sort_by(|a, b| b.1.cmp(&a.1));
    for (path, _) in log_files.into_iter().skip(MAX_LOG_FILES) {
        let _ = fs::remove_file(path);
    }
}

/// Initialize the subscriber: env-filtered console plus a non-blocking
/// rolling daily file. The returned guard must stay alive for the process
/// lifetime; dropping it flushes and stops the writer thread.
pub fn init() -> tracing_appender::non_blocking::WorkerGuard {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cafe_counter_lib=debug"));

    prune_old_logs();

    let log_dir = get_log_dir();
    fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, "cafe");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}
