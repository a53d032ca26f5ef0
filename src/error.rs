use crate::cache::error::CacheError;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{stage} produced no rows for indicator '{indicator}'")]
    EmptyResult {
        indicator: String,
        stage: &'static str,
    },

    #[error("Input table '{0}' does not exist, run the pipeline for it first")]
    MissingInput(PathBuf),

    #[error("Failed to create data directory '{0}'")]
    DataDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Data path exists but is not a directory: '{0}'")]
    NotADirectory(PathBuf),
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error writing '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to encode CSV for '{0}'")]
    Encode(PathBuf, #[source] PolarsError),

    #[error("Failed to read CSV '{0}'")]
    Read(PathBuf, #[source] PolarsError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: expected {expected}")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}
