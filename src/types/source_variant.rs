//! Defines the upstream dataset variants that are tried, in order, when
//! requesting a single indicator code from the World Bank API.

use std::fmt;

/// An alternate upstream dataset for the same indicator code.
///
/// The API resolves most codes without an explicit `source` parameter, but
/// some series only answer when the dataset is named: GDP and forest area live
/// in source 2, the AR5 greenhouse gas series in source 40.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceVariant {
    /// No `source` parameter; the API picks its default dataset.
    Auto,
    /// An explicit `source={id}` parameter.
    Source(u16),
}

impl SourceVariant {
    /// The fixed order in which variants are attempted.
    pub const PRIORITY: [SourceVariant; 3] = [
        SourceVariant::Auto,
        SourceVariant::Source(2),
        SourceVariant::Source(40),
    ];

    pub fn source_id(&self) -> Option<u16> {
        match self {
            SourceVariant::Auto => None,
            SourceVariant::Source(id) => Some(*id),
        }
    }

    pub(crate) fn query_suffix(&self) -> String {
        match self.source_id() {
            Some(id) => format!("&source={id}"),
            None => String::new(),
        }
    }
}

/// Formats a variant the way it appears in logs.
///
/// # Examples
///
/// ```
/// use ecotrack::SourceVariant;
///
/// assert_eq!(SourceVariant::Auto.to_string(), "auto");
/// assert_eq!(SourceVariant::Source(40).to_string(), "source=40");
/// ```
impl fmt::Display for SourceVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source_id() {
            Some(id) => write!(f, "source={id}"),
            None => write!(f, "auto"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_starts_without_explicit_source() {
        assert_eq!(SourceVariant::PRIORITY[0].query_suffix(), "");
        assert_eq!(SourceVariant::PRIORITY[1].query_suffix(), "&source=2");
        assert_eq!(SourceVariant::PRIORITY[2].query_suffix(), "&source=40");
    }
}
