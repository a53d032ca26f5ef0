//! The pipeline driver: fetch, normalize, aggregate and persist each
//! configured indicator, then join a pair of cleaned tables.
//!
//! Indicators are processed one after the other. A failing indicator is
//! logged and recorded in the [`PipelineReport`]; it never stops the run.

use crate::cache::indicator_cache::{CacheOrigin, IndicatorCache};
use crate::config::Config;
use crate::error::{PersistError, PipelineError};
use crate::fetch::remote::{IndicatorSource, WorldBankFetcher};
use crate::persist::{read_text_csv, stage_csv, write_csv};
use crate::processing::aggregate::{correlate, global_trend, latest_year, top_n};
use crate::processing::normalize::normalize;
use crate::types::indicator::Indicator;
use crate::types::series::IndicatorSeries;
use crate::utils::ensure_dir_exists;
use log::{error, info, warn};
use std::path::{Path, PathBuf};

const TOP_COUNTRIES: usize = 10;

/// Two indicators, by name, whose cleaned tables are joined after the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationPair {
    pub left: String,
    pub right: String,
}

impl CorrelationPair {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

impl Default for CorrelationPair {
    fn default() -> Self {
        Self::new("gdp_per_capita", "co2_per_capita")
    }
}

/// What was produced for a successfully processed indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorArtifacts {
    /// Rows in the cleaned table.
    pub rows: usize,
    /// Distinct years, i.e. rows in the trend table.
    pub years: usize,
    pub origin: CacheOrigin,
    pub cleaned_path: PathBuf,
    pub trends_path: PathBuf,
}

#[derive(Debug)]
pub enum IndicatorOutcome {
    Processed(IndicatorArtifacts),
    Skipped(PipelineError),
}

/// Per-indicator outcomes of a run, in processing order.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub outcomes: Vec<(Indicator, IndicatorOutcome)>,
    /// `None` when no correlation pair is configured.
    pub correlation: Option<Result<PathBuf, PipelineError>>,
}

impl PipelineReport {
    pub fn processed(&self) -> impl Iterator<Item = (&Indicator, &IndicatorArtifacts)> {
        self.outcomes.iter().filter_map(|(indicator, outcome)| match outcome {
            IndicatorOutcome::Processed(artifacts) => Some((indicator, artifacts)),
            IndicatorOutcome::Skipped(_) => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&Indicator, &PipelineError)> {
        self.outcomes.iter().filter_map(|(indicator, outcome)| match outcome {
            IndicatorOutcome::Skipped(e) => Some((indicator, e)),
            IndicatorOutcome::Processed(_) => None,
        })
    }
}

pub struct Pipeline {
    cache: IndicatorCache,
    processed_dir: PathBuf,
    force_refresh: bool,
    correlation: Option<CorrelationPair>,
}

impl Pipeline {
    /// Builds the cache and the remote fetcher from `config` and creates the
    /// data directories.
    ///
    /// Failing to build the HTTP client is not fatal: the pipeline then runs
    /// on fresh cache files only and every other indicator is skipped.
    ///
    /// # Errors
    ///
    /// [`PipelineError::DataDirCreation`] or [`PipelineError::NotADirectory`]
    /// when the data directories cannot be used.
    pub fn new(config: &Config) -> Result<Self, PipelineError> {
        let raw_dir = config.raw_dir();
        ensure_dir_exists(&raw_dir)?;

        let fetcher = match WorldBankFetcher::new(config.base_url.as_str(), config.request_timeout) {
            Ok(fetcher) => Some(fetcher),
            Err(e) => {
                error!("Failed to initialise the HTTP client, only cached data can be used: {}", e);
                None
            }
        };

        let cache = IndicatorCache::builder()
            .raw_dir(raw_dir)
            .freshness_window(config.freshness_window)
            .maybe_stale_limit(config.stale_limit)
            .maybe_source(fetcher.map(|f| Box::new(f) as Box<dyn IndicatorSource>))
            .build();

        Self::with_cache(cache, config.processed_dir())
    }

    /// A pipeline writing to `processed_dir` on top of an existing cache.
    pub fn with_cache(cache: IndicatorCache, processed_dir: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let processed_dir = processed_dir.into();
        ensure_dir_exists(&processed_dir)?;
        Ok(Self {
            cache,
            processed_dir,
            force_refresh: false,
            correlation: Some(CorrelationPair::default()),
        })
    }

    /// Bypasses fresh cache files for every indicator of the run.
    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    /// Sets the pair joined after the run; `None` disables the join.
    pub fn with_correlation(mut self, correlation: Option<CorrelationPair>) -> Self {
        self.correlation = correlation;
        self
    }

    pub fn cache(&self) -> &IndicatorCache {
        &self.cache
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    /// `{processed_dir}/{name}_cleaned.csv`
    pub fn cleaned_path(&self, name: &str) -> PathBuf {
        self.processed_dir.join(format!("{name}_cleaned.csv"))
    }

    /// `{processed_dir}/{name}_global_trends.csv`
    pub fn trends_path(&self, name: &str) -> PathBuf {
        self.processed_dir.join(format!("{name}_global_trends.csv"))
    }

    /// `{processed_dir}/{left}_vs_{right}_correlation.csv`
    pub fn correlation_path(&self, pair: &CorrelationPair) -> PathBuf {
        self.processed_dir
            .join(format!("{}_vs_{}_correlation.csv", pair.left, pair.right))
    }

    /// Processes every indicator in order, then runs the correlation join.
    pub fn run(&self, indicators: &[Indicator]) -> PipelineReport {
        let mut report = PipelineReport::default();

        for indicator in indicators {
            info!("Processing {} ({})", indicator.name, indicator.code);
            let outcome = match self.process_indicator(indicator) {
                Ok(artifacts) => {
                    info!(
                        "Saved {} rows and {} trend years for {} ({:?})",
                        artifacts.rows, artifacts.years, indicator.name, artifacts.origin
                    );
                    IndicatorOutcome::Processed(artifacts)
                }
                Err(e) => {
                    warn!("Skipping {}: {}", indicator.name, e);
                    IndicatorOutcome::Skipped(e)
                }
            };
            report.outcomes.push((indicator.clone(), outcome));
        }

        report.correlation = self.correlation.as_ref().map(|pair| {
            let result = self.correlate_outputs(pair);
            match &result {
                Ok(path) => info!("Saved correlation table to {}", path.display()),
                Err(e) => warn!("Skipping correlation of {} and {}: {}", pair.left, pair.right, e),
            }
            result
        });

        report
    }

    /// Fetches, cleans and aggregates one indicator and writes both of its
    /// tables.
    ///
    /// Both tables are encoded to temporary files before either target is
    /// replaced, so an encoding failure leaves the previous pair in place.
    pub fn process_indicator(&self, indicator: &Indicator) -> Result<IndicatorArtifacts, PipelineError> {
        let cached = self
            .cache
            .fetch_with_cache(&indicator.code)
            .force_refresh(self.force_refresh)
            .call()?;

        let series = normalize(&cached.series);
        if series.is_empty() {
            return Err(PipelineError::EmptyResult {
                indicator: indicator.name.clone(),
                stage: "normalize",
            });
        }
        let trend = global_trend(&series);
        log_top_countries(indicator, &series);

        let cleaned_path = self.cleaned_path(&indicator.name);
        let trends_path = self.trends_path(&indicator.name);
        let mut cleaned = series
            .to_dataframe()
            .map_err(|e| PersistError::Encode(cleaned_path.clone(), e))?;
        let mut trends = trend
            .to_dataframe()
            .map_err(|e| PersistError::Encode(trends_path.clone(), e))?;

        let staged_cleaned = stage_csv(&mut cleaned, &cleaned_path)?;
        let staged_trends = stage_csv(&mut trends, &trends_path)?;
        staged_cleaned.commit()?;
        staged_trends.commit()?;

        Ok(IndicatorArtifacts {
            rows: series.len(),
            years: trend.len(),
            origin: cached.origin,
            cleaned_path,
            trends_path,
        })
    }

    /// Joins the cleaned tables of `pair` as found on disk and writes the
    /// result.
    pub fn correlate_outputs(&self, pair: &CorrelationPair) -> Result<PathBuf, PipelineError> {
        let left = self.read_cleaned(&pair.left)?;
        let right = self.read_cleaned(&pair.right)?;

        let joined = correlate(&left, &right, &pair.left, &pair.right);
        if joined.is_empty() {
            return Err(PipelineError::EmptyResult {
                indicator: format!("{}_vs_{}", pair.left, pair.right),
                stage: "correlate",
            });
        }

        let path = self.correlation_path(pair);
        let mut df = joined
            .to_dataframe()
            .map_err(|e| PersistError::Encode(path.clone(), e))?;
        info!(
            "Joined {} rows of {} and {}",
            joined.len(),
            pair.left,
            pair.right
        );
        Ok(write_csv(&mut df, &path)?)
    }

    fn read_cleaned(&self, name: &str) -> Result<IndicatorSeries, PipelineError> {
        let path = self.cleaned_path(name);
        if !path.exists() {
            return Err(PipelineError::MissingInput(path));
        }
        let df = read_text_csv(&path)?;
        IndicatorSeries::from_dataframe(&df)
            .map_err(|e| PipelineError::Persist(PersistError::Read(path, e)))
    }
}

fn log_top_countries(indicator: &Indicator, series: &IndicatorSeries) {
    let Some(year) = latest_year(series) else {
        return;
    };
    let top = top_n(series, year).n(TOP_COUNTRIES).call();
    info!("Top {} for {} in {}:", top.len(), indicator.label, year);
    for (rank, entry) in top.iter().enumerate() {
        info!("  {:>2}. {} ({}): {:.2}", rank + 1, entry.country, entry.code, entry.value);
    }
}
