pub mod indicator;
pub mod raw_record;
pub mod series;
pub mod source_variant;
