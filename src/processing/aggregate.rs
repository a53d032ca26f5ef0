//! Derived views over a cleaned [`IndicatorSeries`].
//!
//! All functions here are total: an empty input gives an empty output.

use crate::types::series::{
    CorrelatedRow, CorrelationSeries, IndicatorSeries, RankedEntry, TrendPoint, TrendSeries,
};
use bon::builder;
use log::warn;
use std::collections::{BTreeMap, HashMap};

/// Mean value across countries for every year present, ascending by year.
///
/// # Examples
///
/// ```
/// use ecotrack::{global_trend, IndicatorSeries, Observation};
///
/// let series = IndicatorSeries::from_rows(vec![
///     Observation::new("France", "FR", 2020, 4.0),
///     Observation::new("United States", "US", 2020, 6.0),
///     Observation::new("France", "FR", 2021, 5.0),
/// ]);
///
/// let trend = global_trend(&series);
/// let points: Vec<(i32, f64)> = trend.points.iter().map(|p| (p.year, p.value)).collect();
/// assert_eq!(points, vec![(2020, 5.0), (2021, 5.0)]);
/// ```
pub fn global_trend(series: &IndicatorSeries) -> TrendSeries {
    let mut per_year: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for row in series.iter() {
        let (sum, count) = per_year.entry(row.year).or_insert((0.0, 0));
        *sum += row.value;
        *count += 1;
    }

    TrendSeries {
        points: per_year
            .into_iter()
            .map(|(year, (sum, count))| TrendPoint {
                year,
                value: sum / count as f64,
            })
            .collect(),
    }
}

/// The `n` highest values of `year`, descending. Equal values keep their
/// order in `series`.
///
/// ```
/// use ecotrack::{top_n, IndicatorSeries, Observation};
///
/// let series = IndicatorSeries::from_rows(vec![
///     Observation::new("France", "FR", 2020, 4.5),
///     Observation::new("Qatar", "QA", 2020, 37.6),
///     Observation::new("India", "IN", 2020, 1.7),
/// ]);
///
/// let top = top_n(&series, 2020).n(2).call();
/// assert_eq!(top[0].country, "Qatar");
/// assert_eq!(top.len(), 2);
/// ```
#[builder]
pub fn top_n(
    #[builder(start_fn)] series: &IndicatorSeries,
    #[builder(start_fn)] year: i32,
    #[builder(default = 10)] n: usize,
) -> Vec<RankedEntry> {
    let mut ranked: Vec<RankedEntry> = series
        .iter()
        .filter(|row| row.year == year)
        .map(|row| RankedEntry {
            country: row.country.clone(),
            code: row.code.clone(),
            value: row.value,
        })
        .collect();

    if ranked.is_empty() {
        if !series.is_empty() {
            warn!("No observations for year {} among {} rows", year, series.len());
        }
        return ranked;
    }

    ranked.sort_by(|a, b| b.value.total_cmp(&a.value));
    ranked.truncate(n);
    ranked
}

/// Inner join of two series on `(country, code, year)`.
///
/// Rows follow the order of `a`; a key repeated in `b` yields one row per
/// match, in `b`'s order.
pub fn correlate(
    a: &IndicatorSeries,
    b: &IndicatorSeries,
    label_a: &str,
    label_b: &str,
) -> CorrelationSeries {
    let mut joined = CorrelationSeries {
        label_a: label_a.to_string(),
        label_b: label_b.to_string(),
        rows: Vec::new(),
    };
    if a.is_empty() || b.is_empty() {
        return joined;
    }

    let mut index: HashMap<(&str, &str, i32), Vec<f64>> = HashMap::new();
    for row in b.iter() {
        index
            .entry((row.country.as_str(), row.code.as_str(), row.year))
            .or_default()
            .push(row.value);
    }

    for row in a.iter() {
        let Some(matches) = index.get(&(row.country.as_str(), row.code.as_str(), row.year)) else {
            continue;
        };
        joined.rows.extend(matches.iter().map(|value_b| CorrelatedRow {
            country: row.country.clone(),
            code: row.code.clone(),
            year: row.year,
            value_a: row.value,
            value_b: *value_b,
        }));
    }
    joined
}

/// The most recent year with at least one observation.
pub fn latest_year(series: &IndicatorSeries) -> Option<i32> {
    series.iter().map(|row| row.year).max()
}
