pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod grid;
pub mod layout;
pub mod loader;
pub mod models;
pub mod render;
pub mod scheduler;
pub mod sizing;
pub mod sorter;

pub use crate::config::GridSettings;
pub use crate::errors::{AppError, AppResult};
pub use crate::grid::GridManager;
pub use crate::loader::{FilterOptionsSource, ItemStore, StaticOptions};
pub use crate::models::{FilterOptions, GridSnapshot, Item, ItemId, ItemKind, ViewportEvent};
pub use crate::render::FolderNavigator;

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Installs JSON logging to a daily rolling file under `log_dir`. The filter
/// comes from `RUST_LOG` and defaults to `info`.
pub fn init_tracing(log_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "grid.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
