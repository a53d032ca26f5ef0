pub mod error;
pub mod indicator_cache;
pub(crate) mod raw_csv;
