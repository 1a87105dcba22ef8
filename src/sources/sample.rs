//! Bundled sample data provider.
//!
//! Serves a small built-in dataset of 22 NSW local government areas so the
//! atlas can be exercised without network access. Boundaries are simple
//! squares placed near each area's real location; indicator values are
//! plausible but synthetic.

use async_trait::async_trait;
use geo::{LineString, MultiPolygon, Polygon};

use crate::boundary::RegionBoundary;
use crate::error::Result;
use crate::indicator::Observation;

use super::Provider;

const SOURCE_NAME: &str = "sample";

/// Indicator values shipped with the binary, three years per region.
const SAMPLE_INDICATORS_CSV: &str = include_str!("data/sample_indicators.csv");

/// Half the side length of a sample boundary square, in degrees.
const HALF_SIDE: f64 = 0.05;

/// Sample regions as (name, center longitude, center latitude).
const SAMPLE_REGIONS: [(&str, f64, f64); 22] = [
    ("Sydney", 151.21, -33.87),
    ("Parramatta", 151.00, -33.81),
    ("Blacktown", 150.91, -33.77),
    ("Penrith", 150.70, -33.75),
    ("Liverpool", 150.92, -33.92),
    ("Canterbury-Bankstown", 151.03, -33.92),
    ("Sutherland Shire", 151.06, -34.03),
    ("Northern Beaches", 151.28, -33.74),
    ("Ryde", 151.10, -33.81),
    ("Inner West", 151.13, -33.89),
    ("Randwick", 151.24, -33.92),
    ("Wollongong", 150.89, -34.43),
    ("Newcastle", 151.75, -32.93),
    ("Lake Macquarie", 151.55, -33.05),
    ("Central Coast", 151.34, -33.43),
    ("Maitland", 151.55, -32.73),
    ("Cessnock", 151.36, -32.83),
    ("Port Macquarie-Hastings", 152.90, -31.43),
    ("Coffs Harbour", 153.11, -30.30),
    ("Tweed", 153.54, -28.18),
    ("Wagga Wagga", 147.37, -35.11),
    ("Albury", 146.92, -36.08),
];

/// Provider serving the bundled sample dataset.
#[derive(Debug, Default)]
pub struct SampleProvider;

impl SampleProvider {
    /// Create a sample provider.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Provider for SampleProvider {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn boundaries(&self) -> Result<Vec<RegionBoundary>> {
        Ok(SAMPLE_REGIONS
            .iter()
            .map(|&(name, lon, lat)| {
                RegionBoundary::new(name, square_around(lon, lat), SOURCE_NAME)
            })
            .collect())
    }

    async fn observations(&self) -> Result<Vec<Observation>> {
        super::parse_indicator_csv(SAMPLE_INDICATORS_CSV, super::current_year())
    }
}

/// A square boundary centered on the given point.
fn square_around(lon: f64, lat: f64) -> MultiPolygon<f64> {
    let ring = LineString::from(vec![
        (lon - HALF_SIDE, lat - HALF_SIDE),
        (lon + HALF_SIDE, lat - HALF_SIDE),
        (lon + HALF_SIDE, lat + HALF_SIDE),
        (lon - HALF_SIDE, lat + HALF_SIDE),
        (lon - HALF_SIDE, lat - HALF_SIDE),
    ]);
    MultiPolygon(vec![Polygon::new(ring, vec![])])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary;
    use crate::indicator::Indicator;
    use crate::screen::QualityScreen;

    #[tokio::test]
    async fn test_sample_boundaries() {
        let provider = SampleProvider::new();
        let boundaries = provider.boundaries().await.unwrap();

        assert_eq!(boundaries.len(), 22);
        assert!(boundaries.iter().all(|b| b.source == "sample"));
        // Names come out normalized
        assert!(boundaries.iter().any(|b| b.name == "SYDNEY"));
        assert!(boundaries.iter().any(|b| b.name == "WAGGA WAGGA"));
    }

    #[tokio::test]
    async fn test_sample_observations_cover_all_regions_and_indicators() {
        let provider = SampleProvider::new();
        let boundaries = provider.boundaries().await.unwrap();
        let observations = provider.observations().await.unwrap();

        // 22 regions, 3 years, 5 indicators
        assert_eq!(observations.len(), 22 * 3 * 5);

        for boundary in &boundaries {
            for indicator in Indicator::ALL {
                assert!(
                    observations
                        .iter()
                        .any(|obs| obs.region == boundary.name && obs.indicator == indicator),
                    "missing {indicator} for {}",
                    boundary.name
                );
            }
        }
    }

    #[tokio::test]
    async fn test_sample_observations_pass_screen() {
        let provider = SampleProvider::new();
        let observations = provider.observations().await.unwrap();

        let (kept, rejected) = QualityScreen::new().apply(observations).unwrap();
        assert_eq!(rejected, 0);
        assert_eq!(kept.len(), 22 * 3 * 5);
    }

    #[tokio::test]
    async fn test_sample_years() {
        let provider = SampleProvider::new();
        let observations = provider.observations().await.unwrap();

        let mut years: Vec<i32> = observations.iter().map(|obs| obs.year).collect();
        years.sort_unstable();
        years.dedup();
        assert_eq!(years, vec![2022, 2023, 2024]);
    }

    #[tokio::test]
    async fn test_sample_boundary_contains_own_center() {
        let provider = SampleProvider::new();
        let boundaries = provider.boundaries().await.unwrap();

        // Wagga Wagga sits far from every other sample square
        let hit = boundary::locate(&boundaries, -35.11, 147.37).unwrap();
        assert_eq!(hit.name, "WAGGA WAGGA");
    }
}
