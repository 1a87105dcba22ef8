//! Summary statistics over stored observations.
//!
//! Powers the dashboard stats panel, the `stats` and `rank` commands and
//! the normalization step behind choropleth coloring.

use serde::{Deserialize, Serialize};

use crate::indicator::{Indicator, Observation};

/// Summary statistics for one indicator in one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSummary {
    /// The summarized indicator.
    pub indicator: Indicator,
    /// The observation year.
    pub year: i32,
    /// Number of observations included.
    pub count: usize,
    /// Arithmetic mean of the values.
    pub mean: f64,
    /// Median value. Even-sized sets average the two middle values.
    pub median: f64,
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
}

impl IndicatorSummary {
    /// Summarize a set of observations for one indicator and year.
    ///
    /// Returns `None` when the set is empty. Observations for other
    /// indicators or years are ignored rather than skewing the result.
    #[must_use]
    pub fn from_observations(
        indicator: Indicator,
        year: i32,
        observations: &[Observation],
    ) -> Option<Self> {
        let mut values: Vec<f64> = observations
            .iter()
            .filter(|obs| obs.indicator == indicator && obs.year == year)
            .map(|obs| obs.value)
            .collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);

        let count = values.len();
        #[allow(clippy::cast_precision_loss)]
        let mean = values.iter().sum::<f64>() / count as f64;

        Some(Self {
            indicator,
            year,
            count,
            mean,
            median: median_of_sorted(&values),
            min: values[0],
            max: values[count - 1],
        })
    }

    /// Map a value onto the unit interval relative to this summary's range.
    ///
    /// A degenerate range where all values are equal maps everything to 0.5
    /// so single-valued years still get a mid-ramp color.
    #[must_use]
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= f64::EPSILON {
            return 0.5;
        }
        (value - self.min) / span
    }
}

/// Median of an already sorted, non-empty slice.
fn median_of_sorted(values: &[f64]) -> f64 {
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Rank observations by value, highest first.
///
/// Ties are broken by region name so repeated runs produce the same order.
/// A limit of zero returns the full ranking.
#[must_use]
pub fn rank(observations: &[Observation], limit: usize) -> Vec<Observation> {
    let mut ranked = observations.to_vec();
    ranked.sort_by(|a, b| {
        b.value
            .total_cmp(&a.value)
            .then_with(|| a.region.cmp(&b.region))
    });
    if limit > 0 {
        ranked.truncate(limit);
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(region: &str, value: f64) -> Observation {
        Observation::new(region, Indicator::Population, 2024, value)
    }

    #[test]
    fn test_summary_empty_is_none() {
        let summary = IndicatorSummary::from_observations(Indicator::Population, 2024, &[]);
        assert!(summary.is_none());
    }

    #[test]
    fn test_summary_single_value() {
        let summary =
            IndicatorSummary::from_observations(Indicator::Population, 2024, &[obs("SYDNEY", 42.0)])
                .unwrap();

        assert_eq!(summary.count, 1);
        assert!((summary.mean - 42.0).abs() < f64::EPSILON);
        assert!((summary.median - 42.0).abs() < f64::EPSILON);
        assert!((summary.min - 42.0).abs() < f64::EPSILON);
        assert!((summary.max - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_mean_and_extremes() {
        let observations = vec![obs("A", 10.0), obs("B", 20.0), obs("C", 60.0)];
        let summary =
            IndicatorSummary::from_observations(Indicator::Population, 2024, &observations)
                .unwrap();

        assert_eq!(summary.count, 3);
        assert!((summary.mean - 30.0).abs() < f64::EPSILON);
        assert!((summary.min - 10.0).abs() < f64::EPSILON);
        assert!((summary.max - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_median_odd() {
        let observations = vec![obs("A", 5.0), obs("B", 1.0), obs("C", 3.0)];
        let summary =
            IndicatorSummary::from_observations(Indicator::Population, 2024, &observations)
                .unwrap();
        assert!((summary.median - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_median_even_averages_middle() {
        let observations = vec![obs("A", 1.0), obs("B", 2.0), obs("C", 10.0), obs("D", 20.0)];
        let summary =
            IndicatorSummary::from_observations(Indicator::Population, 2024, &observations)
                .unwrap();
        assert!((summary.median - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_ignores_other_indicators_and_years() {
        let observations = vec![
            obs("A", 10.0),
            Observation::new("A", Indicator::CrimeRate, 2024, 999.0),
            Observation::new("A", Indicator::Population, 2023, 999.0),
        ];
        let summary =
            IndicatorSummary::from_observations(Indicator::Population, 2024, &observations)
                .unwrap();

        assert_eq!(summary.count, 1);
        assert!((summary.max - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_normalize_endpoints_and_midpoint() {
        let observations = vec![obs("A", 100.0), obs("B", 200.0)];
        let summary =
            IndicatorSummary::from_observations(Indicator::Population, 2024, &observations)
                .unwrap();

        assert!((summary.normalize(100.0) - 0.0).abs() < f64::EPSILON);
        assert!((summary.normalize(200.0) - 1.0).abs() < f64::EPSILON);
        assert!((summary.normalize(150.0) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_normalize_degenerate_range() {
        let observations = vec![obs("A", 7.0), obs("B", 7.0)];
        let summary =
            IndicatorSummary::from_observations(Indicator::Population, 2024, &observations)
                .unwrap();
        assert!((summary.normalize(7.0) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rank_descending() {
        let observations = vec![obs("A", 10.0), obs("B", 30.0), obs("C", 20.0)];
        let ranked = rank(&observations, 0);

        let regions: Vec<&str> = ranked.iter().map(|o| o.region.as_str()).collect();
        assert_eq!(regions, vec!["B", "C", "A"]);
    }

    #[test]
    fn test_rank_limit_truncates() {
        let observations = vec![obs("A", 10.0), obs("B", 30.0), obs("C", 20.0)];
        let ranked = rank(&observations, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].region, "B");
    }

    #[test]
    fn test_rank_ties_break_by_name() {
        let observations = vec![obs("ZETA", 5.0), obs("ALPHA", 5.0), obs("MID", 5.0)];
        let ranked = rank(&observations, 0);

        let regions: Vec<&str> = ranked.iter().map(|o| o.region.as_str()).collect();
        assert_eq!(regions, vec!["ALPHA", "MID", "ZETA"]);
    }

    #[test]
    fn test_summary_serializes() {
        let summary =
            IndicatorSummary::from_observations(Indicator::Population, 2024, &[obs("A", 1.0)])
                .unwrap();
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"indicator\":\"population\""));
        assert!(json.contains("\"count\":1"));
    }
}
