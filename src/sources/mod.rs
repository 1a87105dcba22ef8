//! Data source providers and fetch orchestration.
//!
//! A [`Provider`] supplies region boundaries and indicator observations.
//! The live portal provider talks to the open-data portals; the sample
//! provider serves data bundled into the binary so the atlas works without
//! network access. [`fetch`] drives a full fetch cycle: boundaries (cached
//! unless forced), observations through the quality screen, then a snapshot
//! record for provenance.

pub mod portal;
pub mod sample;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::boundary::{self, RegionBoundary};
use crate::config::Config;
use crate::error::Result;
use crate::indicator::{DatasetSnapshot, Indicator, Observation};
use crate::screen::{QualityScreen, ScreenMode};
use crate::storage::Storage;

pub use portal::PortalProvider;
pub use sample::SampleProvider;

/// A source of region boundaries and indicator observations.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The name of this provider (recorded on snapshots and boundaries).
    fn name(&self) -> &'static str;

    /// Fetch region boundaries.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is unreachable or its payload
    /// cannot be decoded.
    async fn boundaries(&self) -> Result<Vec<RegionBoundary>>;

    /// Fetch indicator observations.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is unreachable or its payload
    /// cannot be decoded.
    async fn observations(&self) -> Result<Vec<Observation>>;
}

/// Options controlling a fetch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Skip the network entirely and use bundled sample data.
    pub offline: bool,
    /// Fail instead of falling back to sample data on portal errors.
    pub no_fallback: bool,
    /// Refetch boundaries even when the cache already has them.
    pub force: bool,
    /// Reject the whole fetch when any observation fails the screen.
    pub strict: bool,
}

/// What a fetch cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Name of the provider that supplied the data.
    pub source: String,
    /// Number of boundaries fetched and stored this cycle.
    pub regions_fetched: usize,
    /// Whether the boundary fetch was skipped because the cache had them.
    pub boundary_cache_hit: bool,
    /// Number of observations the provider returned.
    pub observations_fetched: usize,
    /// Number of observations stored after screening.
    pub observations_kept: usize,
    /// Number of observations dropped by the quality screen.
    pub observations_rejected: usize,
    /// Whether a new snapshot was recorded (false when deduplicated).
    pub snapshot_recorded: bool,
}

/// Run a full fetch cycle into the store.
///
/// Uses the live portal by default and the bundled sample data when
/// offline. Portal fetch or decode failures fall back to sample data
/// unless fallback is disabled.
///
/// # Errors
///
/// Returns an error if the selected provider fails (with fallback
/// exhausted or disabled), if strict screening rejects an observation,
/// or if the store cannot be written.
pub async fn fetch(
    config: &Config,
    options: &FetchOptions,
    storage: &mut Storage,
) -> Result<FetchReport> {
    if options.offline {
        info!("Offline fetch requested, using bundled sample data");
        return fetch_with(&SampleProvider::new(), config, options, storage).await;
    }

    let portal = PortalProvider::new(&config.sources)?;
    match fetch_with(&portal, config, options, storage).await {
        Err(e) if e.is_fetch() && !options.no_fallback => {
            warn!("Portal fetch failed ({e}), falling back to bundled sample data");
            fetch_with(&SampleProvider::new(), config, options, storage).await
        }
        other => other,
    }
}

/// Run one fetch cycle against a specific provider.
async fn fetch_with(
    provider: &dyn Provider,
    config: &Config,
    options: &FetchOptions,
    storage: &mut Storage,
) -> Result<FetchReport> {
    info!("Fetching from {} source", provider.name());
    let mut report = FetchReport {
        source: provider.name().to_string(),
        ..FetchReport::default()
    };

    // Boundaries rarely change; refetch only when missing or forced.
    if storage.region_count()? > 0 && !options.force {
        debug!("Boundary cache hit, skipping boundary fetch");
        report.boundary_cache_hit = true;
    } else {
        let mut boundaries = provider.boundaries().await?;
        boundary::simplify_all(&mut boundaries, config.map.simplify_tolerance);
        report.regions_fetched = storage.store_boundaries(&boundaries)?;
        info!("Stored {} region boundaries", report.regions_fetched);
    }

    let fetched = provider.observations().await?;
    report.observations_fetched = fetched.len();

    let mode = if options.strict {
        ScreenMode::Strict
    } else {
        ScreenMode::Drop
    };
    let (kept, rejected) = QualityScreen::with_mode(mode).apply(fetched)?;
    report.observations_rejected = rejected;
    report.observations_kept = storage.upsert_observations(&kept)?;
    info!(
        "Stored {} observations ({} rejected by screen)",
        report.observations_kept, report.observations_rejected
    );

    let payload = serde_json::to_vec(&kept)?;
    let snapshot = DatasetSnapshot::new(provider.name(), &payload, kept.len());
    report.snapshot_recorded = storage.record_snapshot(&snapshot)?.is_some();

    let pruned = storage.prune_snapshots(config.storage.keep_snapshots)?;
    if pruned > 0 {
        debug!("Pruned {pruned} old snapshots");
    }

    Ok(report)
}

/// The year assigned to indicator rows that carry no year column.
pub(crate) fn current_year() -> i32 {
    Utc::now().year()
}

/// One wide row of the indicator CSV: a region with up to five values.
#[derive(Debug, Deserialize)]
struct IndicatorRow {
    #[serde(alias = "lga", alias = "LGA")]
    lga_name: String,
    #[serde(default, alias = "Year")]
    year: Option<i32>,
    #[serde(default)]
    population: Option<f64>,
    #[serde(default)]
    median_income: Option<f64>,
    #[serde(default)]
    unemployment_rate: Option<f64>,
    #[serde(default)]
    housing_median: Option<f64>,
    #[serde(default)]
    crime_rate: Option<f64>,
}

/// Parse wide indicator CSV rows into long-form observations.
///
/// Region names are normalized, empty cells are skipped and rows without
/// a year get the default year.
pub(crate) fn parse_indicator_csv(text: &str, default_year: i32) -> Result<Vec<Observation>> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let mut observations = Vec::new();
    for row in reader.deserialize::<IndicatorRow>() {
        let row = row?;
        let region = boundary::normalize_name(&row.lga_name);
        let year = row.year.unwrap_or(default_year);
        for (indicator, value) in [
            (Indicator::Population, row.population),
            (Indicator::MedianIncome, row.median_income),
            (Indicator::UnemploymentRate, row.unemployment_rate),
            (Indicator::HousingMedian, row.housing_median),
            (Indicator::CrimeRate, row.crime_rate),
        ] {
            if let Some(value) = value {
                observations.push(Observation::new(region.clone(), indicator, year, value));
            }
        }
    }
    Ok(observations)
}
