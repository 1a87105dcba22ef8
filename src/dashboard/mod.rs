//! Dashboard assembly and HTML rendering.
//!
//! A [`Dashboard`] is the fully joined view of the store for one year:
//! boundaries styled per indicator, summary statistics and the pieces the
//! map page needs. Rendering substitutes those pieces into an embedded
//! template; the result is a single self-contained HTML file that only
//! reaches out for Leaflet and basemap tiles.

use std::fmt::Write as _;

use geojson::FeatureCollection;
use serde_json::json;
use tracing::debug;

use crate::boundary::normalize_name;
use crate::choropleth::{self, ColorRamp, IndicatorLayer};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::indicator::Indicator;
use crate::stats::IndicatorSummary;
use crate::storage::Storage;

/// Embedded dashboard page template.
const DASHBOARD_TEMPLATE: &str = include_str!("templates/dashboard.html");

/// A joined, render-ready view of the store for one year.
#[derive(Debug)]
pub struct Dashboard {
    year: i32,
    years: Vec<i32>,
    feature_collection: FeatureCollection,
    summaries: Vec<IndicatorSummary>,
    ramp: ColorRamp,
}

impl Dashboard {
    /// Join stored boundaries and observations into a dashboard.
    ///
    /// Uses the latest stored year when none is given. When a region
    /// filter is given, the map is limited to those regions and any
    /// name not in the store is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store has no boundaries, no observations,
    /// no observations for the requested year, or a requested region is
    /// not in the store.
    pub fn build(
        storage: &Storage,
        config: &Config,
        year: Option<i32>,
        regions: Option<&[String]>,
    ) -> Result<Self> {
        let mut boundaries = storage.boundaries()?;
        if boundaries.is_empty() {
            return Err(Error::no_data("region boundaries"));
        }

        let filter = match regions {
            Some(names) if !names.is_empty() => {
                let normalized: Vec<String> =
                    names.iter().map(|name| normalize_name(name)).collect();
                for name in &normalized {
                    if !boundaries.iter().any(|b| &b.name == name) {
                        return Err(Error::unknown_region(name));
                    }
                }
                boundaries.retain(|b| normalized.contains(&b.name));
                Some(normalized)
            }
            _ => None,
        };

        let years = storage.years()?;
        let year = match year {
            Some(year) if years.contains(&year) => year,
            Some(year) => {
                return Err(Error::no_data(format!("observations for year {year}")));
            }
            None => years
                .last()
                .copied()
                .ok_or_else(|| Error::no_data("observations"))?,
        };

        let ramp = ColorRamp::new(config.map.color_ramp.clone())?;
        let mut layers = Vec::with_capacity(Indicator::ALL.len());
        let mut summaries = Vec::new();
        for ind in Indicator::ALL {
            let observations = storage.observations(ind, year, filter.as_deref())?;
            let layer = IndicatorLayer::new(ind, year, &observations);
            if let Some(summary) = layer.summary() {
                summaries.push(summary.clone());
            }
            layers.push(layer);
        }

        let feature_collection =
            choropleth::build_feature_collection(&boundaries, &layers, &ramp);
        debug!(
            "Built dashboard for {year} with {} regions",
            feature_collection.features.len()
        );

        Ok(Self {
            year,
            years,
            feature_collection,
            summaries,
            ramp,
        })
    }

    /// The year this dashboard shows.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.year
    }

    /// All years with stored observations.
    #[must_use]
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    /// Summary statistics for every indicator with data this year.
    #[must_use]
    pub fn summaries(&self) -> &[IndicatorSummary] {
        &self.summaries
    }

    /// The styled feature collection as GeoJSON text.
    #[must_use]
    pub fn feature_collection_json(&self) -> String {
        self.feature_collection.to_string()
    }

    /// Machine-readable summary of this dashboard, for the JSON API.
    #[must_use]
    pub fn summary_json(&self) -> serde_json::Value {
        let mut indicators = serde_json::Map::new();
        for indicator in Indicator::ALL {
            let entry = match self.summary_for(indicator) {
                Some(s) => json!({
                    "label": indicator.label(),
                    "count": s.count,
                    "mean": s.mean,
                    "median": s.median,
                    "min": s.min,
                    "max": s.max,
                }),
                None => json!({ "label": indicator.label(), "count": 0 }),
            };
            indicators.insert(indicator.as_str().to_string(), entry);
        }

        json!({
            "year": self.year,
            "years": self.years,
            "region_count": self.feature_collection.features.len(),
            "indicators": indicators,
        })
    }

    /// Render the dashboard page using template substitution.
    ///
    /// The given indicator is the initial map selection; the page can
    /// switch to any other without a round trip.
    ///
    /// # Errors
    ///
    /// Returns an error if a data blob cannot be serialized.
    pub fn render(&self, config: &Config, indicator: Indicator) -> Result<String> {
        let mut output = DASHBOARD_TEMPLATE.to_string();

        // Substitute page metadata
        output = output.replace("{{title}}", &escape_html(&config.dashboard.title));
        output = output.replace("{{year}}", &self.year.to_string());
        output = output.replace("{{year_options}}", &self.year_options_html());
        output = output.replace(
            "{{indicator_options}}",
            &indicator_options_html(indicator),
        );
        output = output.replace("{{default_indicator}}", indicator.as_str());

        // Substitute map settings
        output = output.replace("{{center_lat}}", &config.map.center_lat.to_string());
        output = output.replace("{{center_lon}}", &config.map.center_lon.to_string());
        output = output.replace("{{zoom}}", &config.map.zoom.to_string());
        output = output.replace("{{fill_opacity}}", &config.map.fill_opacity.to_string());
        output = output.replace("{{stroke_weight}}", &config.map.stroke_weight.to_string());
        output = output.replace("{{table_limit}}", &config.dashboard.table_limit.to_string());
        output = output.replace("{{missing_color}}", choropleth::MISSING_COLOR);
        output = output.replace("{{ramp_colors}}", &script_safe(serde_json::to_string(
            self.ramp.colors(),
        )?));

        // Substitute data blobs
        output = output.replace(
            "{{feature_collection}}",
            &script_safe(self.feature_collection_json()),
        );
        output = output.replace("{{summaries}}", &script_safe(self.summaries_blob()?));

        Ok(output)
    }

    fn summary_for(&self, indicator: Indicator) -> Option<&IndicatorSummary> {
        self.summaries.iter().find(|s| s.indicator == indicator)
    }

    /// Display-formatted summaries keyed by indicator, for the stats panel.
    fn summaries_blob(&self) -> Result<String> {
        let mut map = serde_json::Map::new();
        for indicator in Indicator::ALL {
            let entry = match self.summary_for(indicator) {
                Some(s) => json!({
                    "label": indicator.label(),
                    "count": s.count,
                    "mean": indicator.format_value(s.mean),
                    "median": indicator.format_value(s.median),
                    "min": indicator.format_value(s.min),
                    "max": indicator.format_value(s.max),
                }),
                None => json!({ "label": indicator.label(), "count": 0 }),
            };
            map.insert(indicator.as_str().to_string(), entry);
        }
        serde_json::to_string(&serde_json::Value::Object(map)).map_err(Error::from)
    }

    fn year_options_html(&self) -> String {
        let mut html = String::new();
        for year in &self.years {
            let selected = if *year == self.year { " selected" } else { "" };
            let _ = write!(html, "<option value=\"{year}\"{selected}>{year}</option>");
        }
        html
    }
}

fn indicator_options_html(selected: Indicator) -> String {
    let mut html = String::new();
    for indicator in Indicator::ALL {
        let marker = if indicator == selected { " selected" } else { "" };
        let _ = write!(
            html,
            "<option value=\"{}\"{marker}>{}</option>",
            indicator.as_str(),
            indicator.label()
        );
    }
    html
}

/// Escape text for safe interpolation into HTML content.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Keep an embedded JSON string from closing the surrounding script tag.
fn script_safe(json: String) -> String {
    json.replace("</", "<\\/")
}
