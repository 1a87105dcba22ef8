//! Core indicator types for lgatlas.
//!
//! This module defines the fundamental data structures for representing
//! regional indicator values and the snapshots that delivered them.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A regional indicator tracked by the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    /// Resident population count.
    Population,
    /// Median weekly household income in dollars.
    MedianIncome,
    /// Unemployment rate as a percentage of the labour force.
    UnemploymentRate,
    /// Median house sale price in dollars.
    HousingMedian,
    /// Criminal incidents per 100,000 residents.
    CrimeRate,
}

/// How an indicator's values are formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// A plain count.
    Count,
    /// A dollar amount.
    Currency,
    /// A percentage.
    Percent,
    /// A per-capita rate.
    Rate,
}

impl Indicator {
    /// All indicators, in dashboard display order.
    pub const ALL: [Self; 5] = [
        Self::Population,
        Self::MedianIncome,
        Self::UnemploymentRate,
        Self::HousingMedian,
        Self::CrimeRate,
    ];

    /// The column key used in data files and storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Population => "population",
            Self::MedianIncome => "median_income",
            Self::UnemploymentRate => "unemployment_rate",
            Self::HousingMedian => "housing_median",
            Self::CrimeRate => "crime_rate",
        }
    }

    /// Human-readable label for dropdowns and table headers.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Population => "Population",
            Self::MedianIncome => "Median Income",
            Self::UnemploymentRate => "Unemployment Rate",
            Self::HousingMedian => "Median House Price",
            Self::CrimeRate => "Crime Rate",
        }
    }

    /// How values of this indicator are formatted.
    #[must_use]
    pub fn value_kind(&self) -> ValueKind {
        match self {
            Self::Population => ValueKind::Count,
            Self::MedianIncome | Self::HousingMedian => ValueKind::Currency,
            Self::UnemploymentRate => ValueKind::Percent,
            Self::CrimeRate => ValueKind::Rate,
        }
    }

    /// Format a value of this indicator for display.
    ///
    /// Percentages get one decimal place, dollar amounts get a `$` prefix and
    /// thousands separators, and other values over 100 drop their decimals.
    /// Non-finite values render as "N/A".
    #[must_use]
    pub fn format_value(&self, value: f64) -> String {
        if !value.is_finite() {
            return "N/A".to_string();
        }
        match self.value_kind() {
            ValueKind::Percent => format!("{value:.1}%"),
            ValueKind::Currency => format!("${}", group_thousands(value)),
            ValueKind::Count | ValueKind::Rate => {
                if value > 100.0 {
                    group_thousands(value)
                } else {
                    format!("{value:.1}")
                }
            }
        }
    }
}

impl std::fmt::Display for Indicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Indicator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|indicator| indicator.as_str() == s)
            .copied()
            .ok_or_else(|| Error::UnknownIndicator {
                name: s.to_string(),
            })
    }
}

/// Round to the nearest integer and insert thousands separators.
#[allow(clippy::cast_possible_truncation)]
fn group_thousands(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if rounded < 0 {
        format!("-{out}")
    } else {
        out
    }
}

/// A single indicator value for one region and year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Normalized region name.
    pub region: String,
    /// The indicator this value belongs to.
    pub indicator: Indicator,
    /// Calendar year the value refers to.
    pub year: i32,
    /// The observed value.
    pub value: f64,
}

impl Observation {
    /// Create a new observation.
    #[must_use]
    pub fn new(region: impl Into<String>, indicator: Indicator, year: i32, value: f64) -> Self {
        Self {
            region: region.into(),
            indicator,
            year,
            value,
        }
    }
}

/// A record of one ingested data payload.
///
/// Snapshots deduplicate re-fetches: two pulls of byte-identical data share
/// a content hash and only the first is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    /// Unique identifier for this snapshot (assigned by storage layer).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// When the payload was fetched.
    pub fetched_at: DateTime<Utc>,

    /// Which source produced the payload.
    pub source: String,

    /// BLAKE3 hash of the raw payload for deduplication.
    pub content_hash: String,

    /// Number of observations decoded from the payload.
    pub record_count: usize,
}

impl DatasetSnapshot {
    /// Create a new snapshot for a raw payload.
    ///
    /// Automatically computes the content hash and sets the fetch time to now.
    #[must_use]
    pub fn new(source: impl Into<String>, payload: &[u8], record_count: usize) -> Self {
        Self {
            id: None,
            fetched_at: Utc::now(),
            source: source.into(),
            content_hash: Self::compute_hash(payload),
            record_count,
        }
    }

    /// Compute the BLAKE3 hash of a raw payload.
    #[must_use]
    pub fn compute_hash(payload: &[u8]) -> String {
        blake3::hash(payload).to_hex().to_string()
    }

    /// Check if this snapshot's payload matches the given hash.
    #[must_use]
    pub fn matches_hash(&self, hash: &str) -> bool {
        self.content_hash == hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_display() {
        assert_eq!(Indicator::Population.to_string(), "population");
        assert_eq!(Indicator::MedianIncome.to_string(), "median_income");
        assert_eq!(Indicator::CrimeRate.to_string(), "crime_rate");
    }

    #[test]
    fn test_indicator_from_str() {
        assert_eq!(
            Indicator::from_str("housing_median").unwrap(),
            Indicator::HousingMedian
        );
        assert_eq!(
            Indicator::from_str("unemployment_rate").unwrap(),
            Indicator::UnemploymentRate
        );
    }

    #[test]
    fn test_indicator_from_str_unknown() {
        let err = Indicator::from_str("happiness").unwrap_err();
        assert!(err.to_string().contains("happiness"));
    }

    #[test]
    fn test_indicator_round_trip() {
        for indicator in Indicator::ALL {
            assert_eq!(Indicator::from_str(indicator.as_str()).unwrap(), indicator);
        }
    }

    #[test]
    fn test_indicator_labels() {
        assert_eq!(Indicator::Population.label(), "Population");
        assert_eq!(Indicator::HousingMedian.label(), "Median House Price");
    }

    #[test]
    fn test_value_kinds() {
        assert_eq!(Indicator::Population.value_kind(), ValueKind::Count);
        assert_eq!(Indicator::MedianIncome.value_kind(), ValueKind::Currency);
        assert_eq!(Indicator::HousingMedian.value_kind(), ValueKind::Currency);
        assert_eq!(
            Indicator::UnemploymentRate.value_kind(),
            ValueKind::Percent
        );
        assert_eq!(Indicator::CrimeRate.value_kind(), ValueKind::Rate);
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(Indicator::UnemploymentRate.format_value(6.4), "6.4%");
        assert_eq!(Indicator::UnemploymentRate.format_value(10.0), "10.0%");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(Indicator::MedianIncome.format_value(90000.0), "$90,000");
        assert_eq!(
            Indicator::HousingMedian.format_value(1_250_000.0),
            "$1,250,000"
        );
    }

    #[test]
    fn test_format_count() {
        assert_eq!(Indicator::Population.format_value(5_312_163.0), "5,312,163");
        assert_eq!(Indicator::Population.format_value(99.0), "99.0");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(Indicator::CrimeRate.format_value(85.5), "85.5");
        assert_eq!(Indicator::CrimeRate.format_value(3250.0), "3,250");
    }

    #[test]
    fn test_format_non_finite() {
        assert_eq!(Indicator::Population.format_value(f64::NAN), "N/A");
        assert_eq!(Indicator::Population.format_value(f64::INFINITY), "N/A");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(1_234_567.0), "1,234,567");
        assert_eq!(group_thousands(999.0), "999");
        assert_eq!(group_thousands(1000.0), "1,000");
        assert_eq!(group_thousands(-1234.0), "-1,234");
    }

    #[test]
    fn test_observation_new() {
        let obs = Observation::new("SYDNEY", Indicator::Population, 2024, 250_000.0);
        assert_eq!(obs.region, "SYDNEY");
        assert_eq!(obs.indicator, Indicator::Population);
        assert_eq!(obs.year, 2024);
    }

    #[test]
    fn test_snapshot_new() {
        let snapshot = DatasetSnapshot::new("portal", b"payload bytes", 42);
        assert!(snapshot.id.is_none());
        assert_eq!(snapshot.source, "portal");
        assert_eq!(snapshot.record_count, 42);
        assert!(!snapshot.content_hash.is_empty());
    }

    #[test]
    fn test_snapshot_hash_consistency() {
        let hash1 = DatasetSnapshot::compute_hash(b"payload");
        let hash2 = DatasetSnapshot::compute_hash(b"payload");
        assert_eq!(hash1, hash2);

        let different = DatasetSnapshot::compute_hash(b"other payload");
        assert_ne!(hash1, different);
    }

    #[test]
    fn test_snapshot_matches_hash() {
        let snapshot = DatasetSnapshot::new("portal", b"data", 1);
        let hash = DatasetSnapshot::compute_hash(b"data");
        assert!(snapshot.matches_hash(&hash));
        assert!(!snapshot.matches_hash("invalid_hash"));
    }

    #[test]
    fn test_observation_serialization() {
        let obs = Observation::new("NEWCASTLE", Indicator::CrimeRate, 2023, 3100.5);
        let json = serde_json::to_string(&obs).unwrap();
        let deserialized: Observation = serde_json::from_str(&json).unwrap();
        assert_eq!(obs, deserialized);
        assert!(json.contains("crime_rate"));
    }
}
