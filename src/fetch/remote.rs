//! The World Bank indicator fetcher.
//!
//! A request is tried against each [`SourceVariant`] in priority order; the
//! first variant whose page carries at least one record wins. Rejections,
//! HTTP errors and transport failures only move on to the next variant.

use crate::fetch::error::FetchError;
use crate::fetch::transport::{HttpTransport, Transport};
use crate::types::raw_record::{lenient_text, RawRecord, RawSeries};
use crate::types::source_variant::SourceVariant;
use log::{debug, error, info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.worldbank.org/v2";
pub const ALL_COUNTRIES: &str = "all";
const PER_PAGE: u32 = 16_000;

/// Anything that can produce the raw records of an indicator.
///
/// The cache sits above this trait; sources know nothing about the cache.
pub trait IndicatorSource {
    fn fetch(&self, indicator: &str, country: &str) -> Result<RawSeries, FetchError>;
}

/// The two shapes the API answers with, plus a catch-all.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiResponse {
    /// `[metadata, records]`; records are `null` when the source has no data.
    Page(Value, Option<Vec<RawRecord>>),
    /// `[{"message": [{"id": ..., "key": ..., "value": ...}]}]`
    Message([MessageEnvelope; 1]),
    Unrecognized(Value),
}

#[derive(Debug, Deserialize)]
struct MessageEnvelope {
    #[serde(default)]
    message: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default, deserialize_with = "lenient_text")]
    value: Option<String>,
}

pub struct WorldBankFetcher<T = HttpTransport> {
    base_url: String,
    transport: T,
}

impl WorldBankFetcher<HttpTransport> {
    /// A fetcher backed by a blocking HTTP client.
    ///
    /// Fails with [`FetchError::ClientBuild`] when the HTTP stack cannot be
    /// initialised.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self::with_transport(base_url, HttpTransport::new(timeout)?))
    }
}

impl<T: Transport> WorldBankFetcher<T> {
    pub fn with_transport(base_url: impl Into<String>, transport: T) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
        }
    }

    pub fn indicator_url(&self, indicator: &str, country: &str, variant: SourceVariant) -> String {
        format!(
            "{}/country/{}/indicator/{}?format=json&per_page={}{}",
            self.base_url.trim_end_matches('/'),
            country,
            indicator,
            PER_PAGE,
            variant.query_suffix()
        )
    }

    /// Tries every source variant in order and returns the first usable page.
    pub fn fetch_indicator(&self, indicator: &str, country: &str) -> Result<RawSeries, FetchError> {
        for variant in SourceVariant::PRIORITY {
            let url = self.indicator_url(indicator, country, variant);
            info!("Requesting {} ({})", indicator, url);

            match self.attempt(&url) {
                Ok(series) => {
                    info!(
                        "Fetched {} records ({} malformed) for {} with source variant {}",
                        series.len(),
                        series.malformed_count(),
                        indicator,
                        variant
                    );
                    return Ok(series);
                }
                Err(e @ FetchError::ApiMessage { .. }) | Err(e @ FetchError::EmptyPage(_)) => {
                    debug!("Source variant {} rejected for {}: {}", variant, indicator, e);
                }
                Err(e) => {
                    warn!("Source variant {} failed for {}: {}", variant, indicator, e);
                }
            }
        }

        error!("No usable source for indicator {}", indicator);
        Err(FetchError::NoUsableSource {
            indicator: indicator.to_string(),
            attempts: SourceVariant::PRIORITY.len(),
        })
    }

    fn attempt(&self, url: &str) -> Result<RawSeries, FetchError> {
        let body = self.transport.get(url)?;
        let response: ApiResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(url.to_string(), e))?;

        match response {
            ApiResponse::Page(meta, Some(records)) if !records.is_empty() => {
                warn_if_truncated(&meta, url);
                Ok(RawSeries::new(records))
            }
            ApiResponse::Page(..) => Err(FetchError::EmptyPage(url.to_string())),
            ApiResponse::Message([envelope]) => Err(FetchError::ApiMessage {
                url: url.to_string(),
                message: envelope
                    .message
                    .into_iter()
                    .find_map(|m| m.value)
                    .unwrap_or_else(|| "unspecified error".to_string()),
            }),
            ApiResponse::Unrecognized(_) => Err(FetchError::UnexpectedShape(url.to_string())),
        }
    }
}

impl<T: Transport> IndicatorSource for WorldBankFetcher<T> {
    fn fetch(&self, indicator: &str, country: &str) -> Result<RawSeries, FetchError> {
        self.fetch_indicator(indicator, country)
    }
}

/// The API reports paging as numbers or numeric strings depending on the endpoint.
fn warn_if_truncated(meta: &Value, url: &str) {
    let pages = meta.get("pages").and_then(|p| match p {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    });
    if let Some(pages) = pages.filter(|p| *p > 1) {
        warn!(
            "Response from {} spans {} pages; only the first {} records were kept",
            url, pages, PER_PAGE
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    const BASE: &str = "http://api.test/v2";

    /// Answers by the `source=` suffix of the requested URL and records every call.
    struct ScriptedTransport {
        auto: Result<&'static str, ()>,
        source_2: Result<&'static str, ()>,
        source_40: Result<&'static str, ()>,
        calls: RefCell<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(
            auto: Result<&'static str, ()>,
            source_2: Result<&'static str, ()>,
            source_40: Result<&'static str, ()>,
        ) -> Self {
            Self {
                auto,
                source_2,
                source_40,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn get(&self, url: &str) -> Result<String, FetchError> {
            self.calls.borrow_mut().push(url.to_string());
            let scripted = if url.ends_with("&source=2") {
                self.source_2
            } else if url.ends_with("&source=40") {
                self.source_40
            } else {
                self.auto
            };
            scripted.map(str::to_string).map_err(|()| FetchError::Transport {
                url: url.to_string(),
                reason: "connection refused".into(),
            })
        }
    }

    const ERROR_BODY: &str =
        r#"[{"message":[{"id":"120","key":"Invalid value","value":"The provided parameter value is not valid"}]}]"#;
    const FRANCE_PAGE: &str = r#"[{"page":1,"pages":1,"per_page":16000,"total":1},
        [{"indicator":{"id":"NY.GDP.PCAP.CD","value":"GDP per capita"},
          "country":{"id":"FR","value":"France"},"countryiso3code":"FRA",
          "date":"2020","value":39000.5,"unit":"","obs_status":"","decimal":1}]]"#;
    const NULL_PAGE: &str = r#"[{"page":0,"pages":0,"per_page":16000,"total":0},null]"#;

    #[test]
    fn builds_request_url_per_variant() {
        let fetcher = WorldBankFetcher::with_transport(
            "http://api.test/v2/",
            ScriptedTransport::new(Err(()), Err(()), Err(())),
        );
        assert_eq!(
            fetcher.indicator_url("AG.LND.FRST.ZS", "all", SourceVariant::Source(2)),
            "http://api.test/v2/country/all/indicator/AG.LND.FRST.ZS?format=json&per_page=16000&source=2"
        );
        assert_eq!(
            fetcher.indicator_url("AG.LND.FRST.ZS", "FR", SourceVariant::Auto),
            "http://api.test/v2/country/FR/indicator/AG.LND.FRST.ZS?format=json&per_page=16000"
        );
    }

    #[test]
    fn falls_back_to_second_variant_after_error_message() -> Result<(), FetchError> {
        let fetcher = WorldBankFetcher::with_transport(
            BASE,
            ScriptedTransport::new(Ok(ERROR_BODY), Ok(FRANCE_PAGE), Ok(NULL_PAGE)),
        );

        let series = fetcher.fetch_indicator("NY.GDP.PCAP.CD", ALL_COUNTRIES)?;

        assert_eq!(series.len(), 1);
        let observation = series.records[0].observation().expect("valid record");
        assert_eq!(observation.country.value.as_deref(), Some("France"));
        // The third variant is never requested once the second one succeeded.
        assert_eq!(fetcher.transport.calls.borrow().len(), 2);
        Ok(())
    }

    #[test]
    fn transport_failure_and_null_page_move_to_next_variant() -> Result<(), FetchError> {
        let fetcher = WorldBankFetcher::with_transport(
            BASE,
            ScriptedTransport::new(Err(()), Ok(NULL_PAGE), Ok(FRANCE_PAGE)),
        );

        let series = fetcher.fetch_indicator("EN.GHG.ALL.MT.CE.AR5", ALL_COUNTRIES)?;

        assert_eq!(series.len(), 1);
        assert_eq!(fetcher.transport.calls.borrow().len(), 3);
        Ok(())
    }

    #[test]
    fn first_usable_variant_short_circuits() -> Result<(), FetchError> {
        let fetcher = WorldBankFetcher::with_transport(
            BASE,
            ScriptedTransport::new(Ok(FRANCE_PAGE), Ok(FRANCE_PAGE), Ok(FRANCE_PAGE)),
        );

        fetcher.fetch_indicator("NY.GDP.PCAP.CD", ALL_COUNTRIES)?;

        let calls = fetcher.transport.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].contains("source="));
        Ok(())
    }

    #[test]
    fn exhausting_all_variants_is_no_usable_source() {
        let fetcher = WorldBankFetcher::with_transport(
            BASE,
            ScriptedTransport::new(Ok(ERROR_BODY), Ok("<html>maintenance</html>"), Ok("{}")),
        );

        let result = fetcher.fetch_indicator("XX.UNKNOWN", ALL_COUNTRIES);

        match result {
            Err(FetchError::NoUsableSource { indicator, attempts }) => {
                assert_eq!(indicator, "XX.UNKNOWN");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected NoUsableSource, got {other:?}"),
        }
    }

    #[test]
    fn empty_record_list_is_not_usable() {
        let fetcher = WorldBankFetcher::with_transport(
            BASE,
            ScriptedTransport::new(Ok(r#"[{"page":1},[]]"#), Err(()), Err(())),
        );
        assert!(fetcher.fetch_indicator("AG.LND.FRST.ZS", ALL_COUNTRIES).is_err());
    }

    #[test]
    fn error_message_text_is_surfaced() {
        let fetcher = WorldBankFetcher::with_transport(
            BASE,
            ScriptedTransport::new(Ok(ERROR_BODY), Err(()), Err(())),
        );
        let url = fetcher.indicator_url("X", ALL_COUNTRIES, SourceVariant::Auto);

        match fetcher.attempt(&url) {
            Err(FetchError::ApiMessage { message, .. }) => {
                assert_eq!(message, "The provided parameter value is not valid");
            }
            other => panic!("expected ApiMessage, got {other:?}"),
        }
    }
}
