use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogConfig;

/// `<dir>/tryon_YYYYmmdd_HHMMSS.log`
pub fn log_file_path(config: &LogConfig) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(&config.dir).join(format!("tryon_{timestamp}.log"))
}

/// stderr + ログファイルの両方に出力する subscriber を設定
///
/// stdout はホストチャネルに使うので書かない。`RUST_LOG` があれば `level` より優先。
pub fn init(config: &LogConfig) -> Result<PathBuf> {
    fs::create_dir_all(&config.dir).with_context(|| format!("failed to create log dir {}", config.dir))?;
    let path = log_file_path(config);
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("tracing subscriber already installed")?;

    Ok(path)
}
