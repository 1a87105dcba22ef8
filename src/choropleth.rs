//! Choropleth layer construction.
//!
//! Joins stored boundaries with observation values and produces a GeoJSON
//! feature collection where every region carries its raw values, display
//! labels and pre-computed fill colors for each indicator. The map page
//! switches indicators by swapping which property it styles from, so no
//! recomputation happens in the browser.

use std::collections::HashMap;

use geojson::{Feature, FeatureCollection};
use tracing::debug;

use crate::boundary::RegionBoundary;
use crate::error::{Error, Result};
use crate::indicator::{Indicator, Observation};
use crate::stats::IndicatorSummary;

/// Fill color for regions with no value for the selected indicator.
pub const MISSING_COLOR: &str = "#cccccc";

/// A sequential color ramp for value-to-color mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorRamp {
    colors: Vec<String>,
}

impl ColorRamp {
    /// Create a ramp from an ordered list of hex colors, low to high.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty.
    pub fn new(colors: Vec<String>) -> Result<Self> {
        if colors.is_empty() {
            return Err(Error::internal("color ramp must have at least one color"));
        }
        Ok(Self { colors })
    }

    /// Number of colors in the ramp.
    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Whether the ramp is empty. Always false for a constructed ramp.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// The ramp colors, low to high.
    #[must_use]
    pub fn colors(&self) -> &[String] {
        &self.colors
    }

    /// Pick the ramp color for a normalized value in `[0, 1]`.
    ///
    /// Values outside the unit interval are clamped.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn color_for(&self, normalized: f64) -> &str {
        let last = self.colors.len() - 1;
        if last == 0 {
            return &self.colors[0];
        }
        let index = (normalized.clamp(0.0, 1.0) * last as f64).floor() as usize;
        &self.colors[index.min(last)]
    }
}

/// Values and summary for one indicator in one year, keyed by region name.
#[derive(Debug, Clone)]
pub struct IndicatorLayer {
    indicator: Indicator,
    summary: Option<IndicatorSummary>,
    values: HashMap<String, f64>,
}

impl IndicatorLayer {
    /// Build a layer from the observations of one indicator and year.
    ///
    /// Observations for other indicators or years are ignored.
    #[must_use]
    pub fn new(indicator: Indicator, year: i32, observations: &[Observation]) -> Self {
        let values = observations
            .iter()
            .filter(|obs| obs.indicator == indicator && obs.year == year)
            .map(|obs| (obs.region.clone(), obs.value))
            .collect();
        let summary = IndicatorSummary::from_observations(indicator, year, observations);
        Self {
            indicator,
            summary,
            values,
        }
    }

    /// The indicator this layer holds values for.
    #[must_use]
    pub fn indicator(&self) -> Indicator {
        self.indicator
    }

    /// Summary statistics, or `None` when the layer has no values.
    #[must_use]
    pub fn summary(&self) -> Option<&IndicatorSummary> {
        self.summary.as_ref()
    }

    /// The raw value for a region, if observed.
    #[must_use]
    pub fn value_for(&self, region: &str) -> Option<f64> {
        self.values.get(region).copied()
    }

    /// The fill color for a region, or the missing color when unobserved.
    #[must_use]
    pub fn color_for<'a>(&self, region: &str, ramp: &'a ColorRamp) -> &'a str {
        match (self.value_for(region), &self.summary) {
            (Some(value), Some(summary)) => ramp.color_for(summary.normalize(value)),
            _ => MISSING_COLOR,
        }
    }
}

/// Join boundaries with indicator layers into a styled feature collection.
///
/// Each feature carries the region name plus three properties per
/// indicator: the raw value (JSON null when unobserved), a formatted
/// `label_*` string and a `fill_*` hex color.
#[must_use]
pub fn build_feature_collection(
    boundaries: &[RegionBoundary],
    layers: &[IndicatorLayer],
    ramp: &ColorRamp,
) -> FeatureCollection {
    let mut features = Vec::with_capacity(boundaries.len());
    for boundary in boundaries {
        let mut feature = Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(
                &boundary.geometry,
            ))),
            id: None,
            properties: None,
            foreign_members: None,
        };
        feature.set_property("name", boundary.name.clone());

        for layer in layers {
            let key = layer.indicator().as_str();
            match layer.value_for(&boundary.name) {
                Some(value) => {
                    feature.set_property(key, value);
                    feature.set_property(
                        format!("label_{key}"),
                        layer.indicator().format_value(value),
                    );
                }
                None => {
                    feature.set_property(key, serde_json::Value::Null);
                    feature.set_property(format!("label_{key}"), "N/A");
                }
            }
            feature.set_property(
                format!("fill_{key}"),
                layer.color_for(&boundary.name, ramp).to_string(),
            );
        }

        features.push(feature);
    }

    debug!(
        "Built feature collection with {} regions and {} indicator layers",
        boundaries.len(),
        layers.len()
    );
    features.into_iter().collect::<FeatureCollection>()
}
