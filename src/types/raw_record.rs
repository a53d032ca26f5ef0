//! Raw World Bank observation records, as they appear in the second element of
//! an API page, before any normalization.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A nested `{id, value}` object, used by the API for both the country and
/// the indicator of an observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CodedValue {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub value: Option<String>,
}

impl CodedValue {
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            value: Some(value.into()),
        }
    }

    fn is_empty(&self) -> bool {
        self.id.is_none() && self.value.is_none()
    }
}

/// A single observation whose country field is a proper object.
///
/// Every scalar field is kept as text: the API sends years as strings and
/// values as numbers, but neither is guaranteed, and coercion is the
/// normalizer's job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawObservation {
    pub country: CodedValue,
    #[serde(default, deserialize_with = "lenient_coded")]
    pub indicator: Option<CodedValue>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub countryiso3code: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub value: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub obs_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub decimal: Option<String>,
}

/// A record of an API page: either a usable observation or something that
/// does not have the observation shape at all (kept for diagnostics).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawRecord {
    Valid(RawObservation),
    Malformed(Value),
}

impl RawRecord {
    pub fn observation(&self) -> Option<&RawObservation> {
        match self {
            RawRecord::Valid(observation) => Some(observation),
            RawRecord::Malformed(_) => None,
        }
    }
}

impl From<RawObservation> for RawRecord {
    fn from(observation: RawObservation) -> Self {
        if observation.country.is_empty() {
            RawRecord::Malformed(Value::Null)
        } else {
            RawRecord::Valid(observation)
        }
    }
}

/// The records of one indicator, as returned by one source variant or
/// loaded back from the raw cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSeries {
    pub records: Vec<RawRecord>,
}

impl RawSeries {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RawRecord> {
        self.records.iter()
    }

    pub fn malformed_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r, RawRecord::Malformed(_)))
            .count()
    }
}

impl From<Vec<RawRecord>> for RawSeries {
    fn from(records: Vec<RawRecord>) -> Self {
        Self::new(records)
    }
}

impl FromIterator<RawRecord> for RawSeries {
    fn from_iter<I: IntoIterator<Item = RawRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Accepts strings, numbers and booleans as text; anything else is null.
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_coded<'de, D>(deserializer: D) -> Result<Option<CodedValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_string_and_numeric_values() -> Result<(), serde_json::Error> {
        let records: Vec<RawRecord> = serde_json::from_value(json!([
            {"country": {"id": "FR", "value": "France"}, "date": "2020", "value": "4.5"},
            {"country": {"id": "US", "value": "United States"}, "date": "2020", "value": 6.25},
        ]))?;

        let first = records[0].observation().expect("first record is valid");
        assert_eq!(first.country, CodedValue::new("FR", "France"));
        assert_eq!(first.value.as_deref(), Some("4.5"));

        let second = records[1].observation().expect("second record is valid");
        assert_eq!(second.value.as_deref(), Some("6.25"));
        Ok(())
    }

    #[test]
    fn records_without_country_object_are_malformed() -> Result<(), serde_json::Error> {
        let records: Vec<RawRecord> = serde_json::from_value(json!([
            {"country": "France", "date": "2020", "value": 1.0},
            {"date": "2020", "value": 1.0},
            "not even an object",
        ]))?;

        assert!(records
            .iter()
            .all(|r| matches!(r, RawRecord::Malformed(_))));
        Ok(())
    }

    #[test]
    fn odd_indicator_field_does_not_invalidate_record() -> Result<(), serde_json::Error> {
        let record: RawRecord = serde_json::from_value(json!({
            "indicator": "EN.GHG.CO2.PC.CE.AR5",
            "country": {"id": "FR", "value": "France"},
            "date": 2020,
            "value": null,
            "decimal": 1
        }))?;

        let observation = record.observation().expect("record is valid");
        assert_eq!(observation.indicator, None);
        assert_eq!(observation.date.as_deref(), Some("2020"));
        assert_eq!(observation.value, None);
        assert_eq!(observation.decimal.as_deref(), Some("1"));
        Ok(())
    }
}
