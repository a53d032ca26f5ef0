use crate::cache::error::CacheError;
use crate::cache::raw_csv::{raw_series_from_dataframe, raw_series_to_dataframe};
use crate::error::PersistError;
use crate::fetch::error::FetchError;
use crate::fetch::remote::{IndicatorSource, ALL_COUNTRIES};
use crate::persist::{read_text_csv, write_csv};
use crate::types::raw_record::RawSeries;
use bon::bon;
use chrono::{DateTime, Local};
use log::{error, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(7 * SECONDS_PER_DAY);
const SECONDS_PER_DAY: u64 = 86_400;

/// Where the series returned by [`IndicatorCache::fetch_with_cache`] came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheOrigin {
    /// A cache file younger than the freshness window; no request was made.
    FreshCache { age: Duration },
    /// A successful request; the cache file was refreshed.
    Network,
    /// Every source failed and an older cache file was used instead.
    StaleCache { age: Duration },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedSeries {
    pub series: RawSeries,
    pub origin: CacheOrigin,
}

/// File-based cache of raw indicator pages, one CSV per indicator code.
///
/// Freshness is decided by the file's modification time only. The cache owns
/// the fetcher it wraps; without one (the HTTP stack could not be
/// initialised) only fresh cache files can be served.
pub struct IndicatorCache {
    raw_dir: PathBuf,
    freshness_window: Duration,
    stale_limit: Option<Duration>,
    source: Option<Box<dyn IndicatorSource>>,
}

#[bon]
impl IndicatorCache {
    /// Creates a cache rooted at `raw_dir`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ecotrack::{IndicatorCache, WorldBankFetcher, DEFAULT_BASE_URL};
    /// use std::time::Duration;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let fetcher = WorldBankFetcher::new(DEFAULT_BASE_URL, Duration::from_secs(20))?;
    /// let cache = IndicatorCache::builder()
    ///     .raw_dir("data/raw")
    ///     .freshness_window(Duration::from_secs(3 * 86_400))
    ///     .source(Box::new(fetcher))
    ///     .build();
    ///
    /// let cached = cache.fetch_with_cache("AG.LND.FRST.ZS").call()?;
    /// println!("{} records ({:?})", cached.series.len(), cached.origin);
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub fn new(
        #[builder(into)] raw_dir: PathBuf,
        #[builder(default = DEFAULT_FRESHNESS_WINDOW)] freshness_window: Duration,
        stale_limit: Option<Duration>,
        source: Option<Box<dyn IndicatorSource>>,
    ) -> Self {
        Self {
            raw_dir,
            freshness_window,
            stale_limit,
            source,
        }
    }

    /// Returns the raw series of `indicator`, from the cache when it is fresh
    /// enough and from the source otherwise.
    ///
    /// Decision order:
    /// 1. Unless `force_refresh`, a cache file younger than the freshness
    ///    window is returned as is. An unreadable file counts as a miss.
    /// 2. Otherwise the source is queried and a non-empty result replaces the
    ///    cache file.
    /// 3. When the source fails, an existing cache file of any age within the
    ///    stale limit is returned with a warning.
    ///
    /// # Errors
    ///
    /// * [`CacheError::MissingCollaborator`] when a request is needed but the
    ///   cache has no source.
    /// * [`CacheError::NotFound`] when the source failed and nothing is cached.
    /// * [`CacheError::StaleCacheExpired`] when the only cached copy is older
    ///   than the configured stale limit.
    /// * [`CacheError::CacheRead`] / [`CacheError::MissingColumn`] when the
    ///   stale fallback file cannot be read.
    #[builder]
    pub fn fetch_with_cache(
        &self,
        #[builder(start_fn)] indicator: &str,
        #[builder(default)] force_refresh: bool,
    ) -> Result<CachedSeries, CacheError> {
        let age = self.cache_age(indicator).unwrap_or_else(|e| {
            warn!("{}; treating {} as not cached", e, indicator);
            None
        });

        if !force_refresh {
            if let Some(age) = age.filter(|age| *age < self.freshness_window) {
                match self.load(indicator) {
                    Ok(series) => {
                        info!(
                            "Cache hit for {} ({} records, {})",
                            indicator,
                            series.len(),
                            describe_age(age)
                        );
                        return Ok(CachedSeries {
                            series,
                            origin: CacheOrigin::FreshCache { age },
                        });
                    }
                    Err(e) => warn!("Unreadable cache for {}, treating as a miss: {}", indicator, e),
                }
            }
        }

        let Some(source) = self.source.as_deref() else {
            error!(
                "No fetcher available, cannot refresh indicator {}",
                indicator
            );
            return Err(CacheError::MissingCollaborator {
                indicator: indicator.to_string(),
            });
        };

        info!("Fetching {} from the remote source", indicator);
        let fetched = source
            .fetch(indicator, ALL_COUNTRIES)
            .and_then(|series| {
                if series.is_empty() {
                    Err(FetchError::EmptyPage(indicator.to_string()))
                } else {
                    Ok(series)
                }
            });

        match fetched {
            Ok(series) => {
                match self.store(indicator, &series) {
                    Ok(path) => info!("Cached {} records for {} to {:?}", series.len(), indicator, path),
                    Err(e) => warn!("Failed to cache {}: {}", indicator, e),
                }
                Ok(CachedSeries {
                    series,
                    origin: CacheOrigin::Network,
                })
            }
            Err(fetch_error) => {
                warn!("Source returned no data for {}: {}", indicator, fetch_error);
                let Some(age) = age else {
                    return Err(CacheError::NotFound {
                        indicator: indicator.to_string(),
                        source: fetch_error,
                    });
                };
                if let Some(limit) = self.stale_limit.filter(|limit| age > *limit) {
                    return Err(CacheError::StaleCacheExpired {
                        indicator: indicator.to_string(),
                        age_days: as_days(age),
                        limit_days: as_days(limit),
                    });
                }
                warn!(
                    "Falling back to stale cache for {} ({}); data may be outdated",
                    indicator,
                    describe_age(age)
                );
                let series = self.load(indicator)?;
                Ok(CachedSeries {
                    series,
                    origin: CacheOrigin::StaleCache { age },
                })
            }
        }
    }
}

impl IndicatorCache {
    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// `{raw_dir}/{indicator}.csv`
    pub fn cache_path(&self, indicator: &str) -> PathBuf {
        self.raw_dir.join(format!("{indicator}.csv"))
    }

    /// Age of the cache file, or `None` when there is no cache file.
    ///
    /// A modification time in the future counts as age zero.
    pub fn cache_age(&self, indicator: &str) -> Result<Option<Duration>, CacheError> {
        let path = self.cache_path(indicator);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::CacheMetadataRead(path, e)),
        };
        let modified = metadata
            .modified()
            .map_err(|e| CacheError::CacheMetadataRead(path, e))?;
        Ok(Some(
            SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO),
        ))
    }

    /// Loads the cached series regardless of its age.
    pub fn load(&self, indicator: &str) -> Result<RawSeries, CacheError> {
        let path = self.cache_path(indicator);
        let df = read_text_csv(&path).map_err(|e| match e {
            PersistError::Read(path, source) => CacheError::CacheRead(path, source),
            other => CacheError::CacheWrite(other),
        })?;
        raw_series_from_dataframe(&df, &path)
    }

    /// Writes `series` as the cache file of `indicator`, replacing any
    /// previous file atomically.
    pub fn store(&self, indicator: &str, series: &RawSeries) -> Result<PathBuf, CacheError> {
        let path = self.cache_path(indicator);
        let mut df = raw_series_to_dataframe(series)
            .map_err(|e| PersistError::Encode(path.clone(), e))?;
        Ok(write_csv(&mut df, &path)?)
    }
}

fn as_days(duration: Duration) -> f64 {
    duration.as_secs_f64() / SECONDS_PER_DAY as f64
}

fn describe_age(age: Duration) -> String {
    let written: DateTime<Local> = (SystemTime::now() - age).into();
    format!(
        "{:.1} days old, written {}",
        as_days(age),
        written.format("%Y-%m-%d %H:%M")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::raw_record::{CodedValue, RawObservation, RawRecord};
    use std::cell::Cell;
    use std::fs::File;
    use std::rc::Rc;

    const CODE: &str = "EN.GHG.CO2.PC.CE.AR5";
    const DAY: Duration = Duration::from_secs(SECONDS_PER_DAY);

    /// Counts requests and answers with a one-record series or a failure.
    struct CountingSource {
        calls: Rc<Cell<usize>>,
        succeed: bool,
    }

    impl IndicatorSource for CountingSource {
        fn fetch(&self, indicator: &str, _country: &str) -> Result<RawSeries, FetchError> {
            self.calls.set(self.calls.get() + 1);
            if self.succeed {
                Ok(series("Germany", "8.1"))
            } else {
                Err(FetchError::NoUsableSource {
                    indicator: indicator.to_string(),
                    attempts: 3,
                })
            }
        }
    }

    fn series(country: &str, value: &str) -> RawSeries {
        RawSeries::new(vec![RawRecord::Valid(RawObservation {
            country: CodedValue::new("XX", country),
            date: Some("2020".into()),
            value: Some(value.into()),
            ..Default::default()
        })])
    }

    fn cache_with(dir: &Path, succeed: bool) -> (IndicatorCache, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let cache = IndicatorCache::builder()
            .raw_dir(dir)
            .source(Box::new(CountingSource {
                calls: calls.clone(),
                succeed,
            }))
            .build();
        (cache, calls)
    }

    fn age_cache_file(cache: &IndicatorCache, age: Duration) -> io::Result<()> {
        let file = File::options().write(true).open(cache.cache_path(CODE))?;
        file.set_modified(SystemTime::now() - age)
    }

    fn country_of(cached: &CachedSeries) -> Option<String> {
        cached.series.records[0]
            .observation()
            .and_then(|o| o.country.value.clone())
    }

    #[test]
    fn fresh_cache_is_served_without_request() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let (cache, calls) = cache_with(dir.path(), true);
        cache.store(CODE, &series("France", "4.5"))?;
        age_cache_file(&cache, 2 * DAY)?;

        let cached = cache.fetch_with_cache(CODE).call()?;

        assert_eq!(calls.get(), 0);
        assert!(matches!(cached.origin, CacheOrigin::FreshCache { .. }));
        assert_eq!(country_of(&cached).as_deref(), Some("France"));
        Ok(())
    }

    #[test]
    fn expired_cache_triggers_request_and_refresh() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let (cache, calls) = cache_with(dir.path(), true);
        cache.store(CODE, &series("France", "4.5"))?;
        age_cache_file(&cache, 7 * DAY)?;

        let cached = cache.fetch_with_cache(CODE).call()?;

        assert_eq!(calls.get(), 1);
        assert_eq!(cached.origin, CacheOrigin::Network);
        assert_eq!(country_of(&cached).as_deref(), Some("Germany"));
        // The refreshed file is fresh again and now holds the new records.
        let reloaded = cache.fetch_with_cache(CODE).call()?;
        assert_eq!(calls.get(), 1);
        assert_eq!(country_of(&reloaded).as_deref(), Some("Germany"));
        Ok(())
    }

    #[test]
    fn force_refresh_ignores_fresh_cache() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let (cache, calls) = cache_with(dir.path(), true);
        cache.store(CODE, &series("France", "4.5"))?;

        let cached = cache.fetch_with_cache(CODE).force_refresh(true).call()?;

        assert_eq!(calls.get(), 1);
        assert_eq!(cached.origin, CacheOrigin::Network);
        Ok(())
    }

    #[test]
    fn failed_request_falls_back_to_stale_cache() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let (cache, calls) = cache_with(dir.path(), false);
        cache.store(CODE, &series("France", "4.5"))?;
        age_cache_file(&cache, 30 * DAY)?;

        let cached = cache.fetch_with_cache(CODE).call()?;

        assert_eq!(calls.get(), 1);
        match cached.origin {
            CacheOrigin::StaleCache { age } => assert!(age >= 29 * DAY),
            other => panic!("expected stale cache, got {other:?}"),
        }
        assert_eq!(country_of(&cached).as_deref(), Some("France"));
        Ok(())
    }

    #[test]
    fn stale_limit_rejects_very_old_cache() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let cache = IndicatorCache::builder()
            .raw_dir(dir.path())
            .stale_limit(90 * DAY)
            .source(Box::new(CountingSource {
                calls: Rc::new(Cell::new(0)),
                succeed: false,
            }))
            .build();
        cache.store(CODE, &series("France", "4.5"))?;
        age_cache_file(&cache, 400 * DAY)?;

        let result = cache.fetch_with_cache(CODE).call();

        assert!(matches!(result, Err(CacheError::StaleCacheExpired { .. })));
        Ok(())
    }

    #[test]
    fn failed_request_without_cache_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let (cache, _calls) = cache_with(dir.path(), false);

        let result = cache.fetch_with_cache(CODE).call();

        assert!(matches!(result, Err(CacheError::NotFound { .. })));
        assert!(!cache.cache_path(CODE).exists());
        Ok(())
    }

    #[test]
    fn missing_source_serves_only_fresh_cache() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let cache = IndicatorCache::builder().raw_dir(dir.path()).build();
        cache.store(CODE, &series("France", "4.5"))?;

        assert!(!cache.has_source());
        assert!(cache.fetch_with_cache(CODE).call().is_ok());

        age_cache_file(&cache, 8 * DAY)?;
        let result = cache.fetch_with_cache(CODE).call();
        assert!(matches!(result, Err(CacheError::MissingCollaborator { .. })));
        Ok(())
    }

    #[test]
    fn corrupt_cache_counts_as_miss() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let (cache, calls) = cache_with(dir.path(), true);
        fs::write(cache.cache_path(CODE), "this,is\nnot,a cache file\n")?;

        let cached = cache.fetch_with_cache(CODE).call()?;

        assert_eq!(calls.get(), 1);
        assert_eq!(cached.origin, CacheOrigin::Network);
        Ok(())
    }

    #[test]
    fn window_boundary_follows_file_age() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let calls = Rc::new(Cell::new(0));
        let cache = IndicatorCache::builder()
            .raw_dir(dir.path())
            .freshness_window(3 * DAY)
            .source(Box::new(CountingSource {
                calls: calls.clone(),
                succeed: true,
            }))
            .build();

        for (age_days, expected_calls) in [(1, 0), (2, 0), (3, 1), (5, 2)] {
            cache.store(CODE, &series("France", "4.5"))?;
            age_cache_file(&cache, age_days * DAY)?;
            cache.fetch_with_cache(CODE).call()?;
            assert_eq!(calls.get(), expected_calls, "cache aged {age_days} days");
        }
        Ok(())
    }
}
