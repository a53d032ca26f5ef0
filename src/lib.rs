//! Fetch, cache and normalize World Bank indicators into flat CSV tables.
//!
//! The pieces can be used on their own ([`WorldBankFetcher`],
//! [`IndicatorCache`], [`normalize`], [`global_trend`]) or driven together by
//! a [`Pipeline`].

mod cache;
mod config;
mod error;
mod fetch;
mod persist;
mod pipeline;
mod processing;
mod types;
mod utils;

pub use config::*;
pub use error::{ConfigError, PersistError, PipelineError};
pub use pipeline::*;

pub use cache::error::CacheError;
pub use cache::indicator_cache::*;

pub use fetch::error::FetchError;
pub use fetch::remote::*;
pub use fetch::transport::*;

pub use persist::{read_text_csv, stage_csv, write_csv, StagedFile};

pub use processing::aggregate::*;
pub use processing::normalize::normalize;

pub use types::indicator::Indicator;
pub use types::raw_record::{CodedValue, RawObservation, RawRecord, RawSeries};
pub use types::series::*;
pub use types::source_variant::SourceVariant;

pub use utils::ensure_dir_exists;
