use anyhow::Context;
use env_logger::{Env, Target};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

pub fn default_log_path() -> PathBuf {
    std::env::temp_dir().join(format!("{}.log", env!("CARGO_PKG_NAME")))
}

/// Routes `log` output to a file. The terminal is in raw mode on the alternate screen, so
/// nothing may be printed to stderr while the app runs. `RUST_LOG` overrides the `info` default.
pub fn init(path: Option<&Path>) -> anyhow::Result<PathBuf> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_log_path);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .target(Target::Pipe(Box::new(file)))
        .try_init()
        .context("install logger")?;

    log::info!("{} v{} starting", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    Ok(path)
}
