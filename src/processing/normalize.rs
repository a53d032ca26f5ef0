use crate::types::raw_record::{RawRecord, RawSeries};
use crate::types::series::{IndicatorSeries, Observation};
use log::{debug, info, warn};

/// Turns raw API records into a cleaned series sorted by `(country, year)`.
///
/// `country` comes from the nested country name, `code` from its id (empty
/// when absent). A record is dropped when it is malformed or when its
/// country, year or value is missing or does not parse. `NaN` counts as
/// missing.
///
/// # Examples
///
/// ```
/// use ecotrack::{normalize, CodedValue, RawObservation, RawRecord, RawSeries};
///
/// let raw = RawSeries::new(vec![
///     RawRecord::Valid(RawObservation {
///         country: CodedValue::new("FR", "France"),
///         date: Some("2020".into()),
///         value: Some("4.5".into()),
///         ..Default::default()
///     }),
///     RawRecord::Valid(RawObservation {
///         country: CodedValue::new("US", "United States"),
///         date: Some("2020".into()),
///         value: None,
///         ..Default::default()
///     }),
/// ]);
///
/// let series = normalize(&raw);
/// assert_eq!(series.len(), 1);
/// assert_eq!(series.rows()[0].country, "France");
/// assert_eq!(series.rows()[0].value, 4.5);
/// ```
pub fn normalize(raw: &RawSeries) -> IndicatorSeries {
    let mut drops = DropCounts::default();
    let mut rows: Vec<Observation> = raw
        .iter()
        .filter_map(|record| to_observation(record, &mut drops))
        .collect();

    // Stable, so duplicate (country, year) pairs keep their input order.
    rows.sort_by(|a, b| a.country.cmp(&b.country).then(a.year.cmp(&b.year)));

    if drops.total() > 0 {
        debug!(
            "Dropped {} records: {} malformed, {} without country, {} without year, {} without value",
            drops.total(),
            drops.malformed,
            drops.country,
            drops.year,
            drops.value
        );
    }
    if rows.is_empty() && !raw.is_empty() {
        warn!("None of the {} raw records survived normalization", raw.len());
    } else {
        info!("Normalized {} of {} raw records", rows.len(), raw.len());
    }

    IndicatorSeries::from_rows(rows)
}

#[derive(Debug, Default)]
struct DropCounts {
    malformed: usize,
    country: usize,
    year: usize,
    value: usize,
}

impl DropCounts {
    fn total(&self) -> usize {
        self.malformed + self.country + self.year + self.value
    }
}

fn to_observation(record: &RawRecord, drops: &mut DropCounts) -> Option<Observation> {
    let RawRecord::Valid(obs) = record else {
        drops.malformed += 1;
        return None;
    };
    let Some(country) = obs.country.value.as_deref().filter(|c| !c.is_empty()) else {
        drops.country += 1;
        return None;
    };
    let Some(year) = obs.date.as_deref().and_then(parse_year) else {
        drops.year += 1;
        return None;
    };
    let Some(value) = obs.value.as_deref().and_then(parse_value) else {
        drops.value += 1;
        return None;
    };

    Some(Observation::new(
        country,
        obs.country.id.as_deref().unwrap_or_default(),
        year,
        value,
    ))
}

/// Parses a year such as `"2020"`, also accepting whole floats like `"2020.0"`.
pub(crate) fn parse_year(text: &str) -> Option<i32> {
    let text = text.trim();
    if let Ok(year) = text.parse::<i32>() {
        return Some(year);
    }
    let year = text.parse::<f64>().ok()?;
    (year.fract() == 0.0 && year >= i32::MIN as f64 && year <= i32::MAX as f64)
        .then_some(year as i32)
}

/// Parses a numeric value, treating `NaN` as missing.
pub(crate) fn parse_value(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}
