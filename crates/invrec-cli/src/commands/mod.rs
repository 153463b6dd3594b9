//! CLI subcommands.

pub mod config;
pub mod process;
pub mod reconcile;
pub mod review;

use std::path::PathBuf;

/// Directory holding the training store's JSON-lines files.
pub fn training_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("invrec")
        .join("training")
}
