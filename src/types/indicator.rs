//! The indicators the pipeline knows how to process.

/// A named World Bank indicator.
///
/// `name` is the stem of the processed files (`{name}_cleaned.csv`), `code`
/// the provider code used for the request and the raw cache file, and `label`
/// the human readable title shown by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Indicator {
    pub name: String,
    pub code: String,
    pub label: String,
}

impl Indicator {
    pub fn new(name: impl Into<String>, code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            label: label.into(),
        }
    }

    /// The four indicators processed by the `ecotrack` binary.
    ///
    /// # Examples
    ///
    /// ```
    /// use ecotrack::Indicator;
    ///
    /// let defaults = Indicator::defaults();
    /// assert_eq!(defaults.len(), 4);
    /// assert_eq!(defaults[2].code, "NY.GDP.PCAP.CD");
    /// ```
    pub fn defaults() -> Vec<Indicator> {
        vec![
            Indicator::new("co2_per_capita", "EN.GHG.CO2.PC.CE.AR5", "CO2 per capita (t)"),
            Indicator::new("forest_area", "AG.LND.FRST.ZS", "Forest area (% of land)"),
            Indicator::new("gdp_per_capita", "NY.GDP.PCAP.CD", "GDP per capita (current US$)"),
            Indicator::new("total_ghg", "EN.GHG.ALL.MT.CE.AR5", "Total GHG emissions (Mt)"),
        ]
    }
}
