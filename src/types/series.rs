//! Flat, normalized tables: the cleaned indicator series, its global trend,
//! and the views derived from it (top-N rankings, correlation joins).
//!
//! Each table converts to a Polars [`DataFrame`] with the exact column layout
//! the dashboard reads from `data/processed/`.

use crate::processing::normalize::{parse_value, parse_year};
use polars::prelude::*;

pub(crate) const COUNTRY: &str = "country";
pub(crate) const CODE: &str = "code";
pub(crate) const YEAR: &str = "year";
pub(crate) const VALUE: &str = "value";

/// One cleaned observation: a country's value of an indicator for a year.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub country: String,
    pub code: String,
    pub year: i32,
    pub value: f64,
}

impl Observation {
    pub fn new(country: impl Into<String>, code: impl Into<String>, year: i32, value: f64) -> Self {
        Self {
            country: country.into(),
            code: code.into(),
            year,
            value,
        }
    }
}

/// An ordered collection of cleaned observations for one indicator.
///
/// Produced by [`crate::normalize`], which sorts rows by `(country, year)`.
/// Rows built by hand through [`IndicatorSeries::from_rows`] keep their
/// order, which matters for the tie-breaking of [`crate::top_n`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSeries {
    rows: Vec<Observation>,
}

impl IndicatorSeries {
    pub fn from_rows(rows: Vec<Observation>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.rows.iter()
    }

    /// Builds the `country, code, year, value` table written as `{name}_cleaned.csv`.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let countries: Vec<String> = self.rows.iter().map(|r| r.country.clone()).collect();
        let codes: Vec<String> = self.rows.iter().map(|r| r.code.clone()).collect();
        let years: Vec<i32> = self.rows.iter().map(|r| r.year).collect();
        let values: Vec<f64> = self.rows.iter().map(|r| r.value).collect();

        DataFrame::new(vec![
            Column::new(COUNTRY.into(), countries),
            Column::new(CODE.into(), codes),
            Column::new(YEAR.into(), years),
            Column::new(VALUE.into(), values),
        ])
    }

    /// Reads a cleaned table back. Expects every column as text (see
    /// [`crate::read_text_csv`]); rows whose year or value does not parse are
    /// skipped.
    pub fn from_dataframe(df: &DataFrame) -> PolarsResult<Self> {
        let countries = df.column(COUNTRY)?.str()?;
        let codes = df.column(CODE)?.str()?;
        let years = df.column(YEAR)?.str()?;
        let values = df.column(VALUE)?.str()?;

        let rows = (0..df.height())
            .filter_map(|i| {
                Some(Observation {
                    country: countries.get(i)?.to_string(),
                    code: codes.get(i).unwrap_or_default().to_string(),
                    year: years.get(i).and_then(parse_year)?,
                    value: values.get(i).and_then(parse_value)?,
                })
            })
            .collect();
        Ok(Self { rows })
    }
}

impl FromIterator<Observation> for IndicatorSeries {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        Self::from_rows(iter.into_iter().collect())
    }
}

/// A single point of a global trend line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendPoint {
    pub year: i32,
    pub value: f64,
}

/// Per-year cross-country means of an indicator, ascending by year.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrendSeries {
    pub points: Vec<TrendPoint>,
}

impl TrendSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Builds the `year, value` table written as `{name}_global_trends.csv`.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let years: Vec<i32> = self.points.iter().map(|p| p.year).collect();
        let values: Vec<f64> = self.points.iter().map(|p| p.value).collect();
        DataFrame::new(vec![
            Column::new(YEAR.into(), years),
            Column::new(VALUE.into(), values),
        ])
    }
}

/// A country's position in a top-N ranking for one year.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    pub country: String,
    pub code: String,
    pub value: f64,
}

/// A row present in both sides of a correlation join.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatedRow {
    pub country: String,
    pub code: String,
    pub year: i32,
    pub value_a: f64,
    pub value_b: f64,
}

/// The inner join of two indicator series on `(country, code, year)`.
///
/// The labels name the value columns: `value_{label_a}` and `value_{label_b}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrelationSeries {
    pub label_a: String,
    pub label_b: String,
    pub rows: Vec<CorrelatedRow>,
}

impl CorrelationSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value_column_a(&self) -> String {
        format!("{VALUE}_{}", self.label_a)
    }

    pub fn value_column_b(&self) -> String {
        format!("{VALUE}_{}", self.label_b)
    }

    /// Fails with a duplicate column error when both labels are equal.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let countries: Vec<String> = self.rows.iter().map(|r| r.country.clone()).collect();
        let codes: Vec<String> = self.rows.iter().map(|r| r.code.clone()).collect();
        let years: Vec<i32> = self.rows.iter().map(|r| r.year).collect();
        let values_a: Vec<f64> = self.rows.iter().map(|r| r.value_a).collect();
        let values_b: Vec<f64> = self.rows.iter().map(|r| r.value_b).collect();

        DataFrame::new(vec![
            Column::new(COUNTRY.into(), countries),
            Column::new(CODE.into(), codes),
            Column::new(YEAR.into(), years),
            Column::new(self.value_column_a().into(), values_a),
            Column::new(self.value_column_b().into(), values_b),
        ])
    }
}
