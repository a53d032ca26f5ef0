use crate::error::PersistError;
use crate::fetch::error::FetchError;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to read metadata for cache file '{0}'")]
    CacheMetadataRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to read cache file '{0}'")]
    CacheRead(PathBuf, #[source] PolarsError),

    #[error("Cache file '{path}' is missing column '{column}'")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error(transparent)]
    CacheWrite(#[from] PersistError),

    #[error("No fetcher available for indicator '{indicator}' and no fresh cache")]
    MissingCollaborator { indicator: String },

    #[error("Cached data for '{indicator}' is {age_days:.1} days old, beyond the {limit_days:.1} day limit")]
    StaleCacheExpired {
        indicator: String,
        age_days: f64,
        limit_days: f64,
    },

    #[error("No data available for indicator '{indicator}'")]
    NotFound {
        indicator: String,
        #[source]
        source: FetchError,
    },
}
