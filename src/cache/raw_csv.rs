//! Flat raw-cache layout of an API page.
//!
//! The nested `country` and `indicator` objects are spread over `_id` and
//! `_value` columns; everything else is stored as the text the API sent.
//! Malformed records are written with empty country columns, which is also
//! how they are recognised on the way back.

use crate::cache::error::CacheError;
use crate::types::raw_record::{CodedValue, RawObservation, RawRecord, RawSeries};
use polars::prelude::*;
use std::path::Path;

const INDICATOR_ID: &str = "indicator_id";
const INDICATOR_VALUE: &str = "indicator_value";
const COUNTRY_ID: &str = "country_id";
const COUNTRY_VALUE: &str = "country_value";
const ISO3: &str = "countryiso3code";
const DATE: &str = "date";
const VALUE: &str = "value";
const UNIT: &str = "unit";
const OBS_STATUS: &str = "obs_status";
const DECIMAL: &str = "decimal";

pub(crate) const RAW_COLUMNS: [&str; 10] = [
    INDICATOR_ID,
    INDICATOR_VALUE,
    COUNTRY_ID,
    COUNTRY_VALUE,
    ISO3,
    DATE,
    VALUE,
    UNIT,
    OBS_STATUS,
    DECIMAL,
];

fn flatten(record: &RawRecord) -> [Option<String>; 10] {
    let Some(obs) = record.observation() else {
        return Default::default();
    };
    let indicator = obs.indicator.clone().unwrap_or_default();
    [
        indicator.id,
        indicator.value,
        obs.country.id.clone(),
        obs.country.value.clone(),
        obs.countryiso3code.clone(),
        obs.date.clone(),
        obs.value.clone(),
        obs.unit.clone(),
        obs.obs_status.clone(),
        obs.decimal.clone(),
    ]
}

pub(crate) fn raw_series_to_dataframe(series: &RawSeries) -> PolarsResult<DataFrame> {
    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(series.len()); 10];
    for record in series.iter() {
        for (column, cell) in columns.iter_mut().zip(flatten(record)) {
            column.push(cell);
        }
    }

    DataFrame::new(
        RAW_COLUMNS
            .iter()
            .zip(columns)
            .map(|(name, values)| Column::new((*name).into(), values))
            .collect(),
    )
}

fn text_column<'a>(
    df: &'a DataFrame,
    name: &'static str,
    path: &Path,
) -> Result<&'a StringChunked, CacheError> {
    df.column(name)
        .map_err(|_| CacheError::MissingColumn {
            path: path.to_path_buf(),
            column: name,
        })?
        .str()
        .map_err(|e| CacheError::CacheRead(path.to_path_buf(), e))
}

/// Rebuilds the records from a cache table read with every column as text.
pub(crate) fn raw_series_from_dataframe(df: &DataFrame, path: &Path) -> Result<RawSeries, CacheError> {
    let indicator_id = text_column(df, INDICATOR_ID, path)?;
    let indicator_value = text_column(df, INDICATOR_VALUE, path)?;
    let country_id = text_column(df, COUNTRY_ID, path)?;
    let country_value = text_column(df, COUNTRY_VALUE, path)?;
    let iso3 = text_column(df, ISO3, path)?;
    let date = text_column(df, DATE, path)?;
    let value = text_column(df, VALUE, path)?;
    let unit = text_column(df, UNIT, path)?;
    let obs_status = text_column(df, OBS_STATUS, path)?;
    let decimal = text_column(df, DECIMAL, path)?;

    let cell = |ca: &StringChunked, i: usize| ca.get(i).map(str::to_string);

    let records = (0..df.height())
        .map(|i| {
            let indicator = CodedValue {
                id: cell(indicator_id, i),
                value: cell(indicator_value, i),
            };
            RawRecord::from(RawObservation {
                country: CodedValue {
                    id: cell(country_id, i),
                    value: cell(country_value, i),
                },
                indicator: (indicator != CodedValue::default()).then_some(indicator),
                countryiso3code: cell(iso3, i),
                date: cell(date, i),
                value: cell(value, i),
                unit: cell(unit, i),
                obs_status: cell(obs_status, i),
                decimal: cell(decimal, i),
            })
        })
        .collect();

    Ok(records)
}
