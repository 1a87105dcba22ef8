//! Configuration management for lgatlas.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::indicator::Indicator;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "lgatlas";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "atlas.db";

/// Pattern a ramp entry must match.
const HEX_COLOR_PATTERN: &str = r"^#[0-9a-fA-F]{6}$";

/// NSW LGA boundary GeoJSON endpoint on data.gov.au.
const DEFAULT_BOUNDARY_URL: &str = "https://data.gov.au/geoserver/nsw-local-government-areas/wfs?request=GetFeature&typeName=ckan_1_f64b8c4dd871409d92a4ae7ed8365786&outputFormat=json";

/// Feature property carrying the LGA name in the boundary payload.
const DEFAULT_BOUNDARY_NAME_PROPERTY: &str = "nsw_lga__3";

/// NSW open data portal CKAN API base.
const DEFAULT_CKAN_BASE_URL: &str = "https://data.nsw.gov.au/data/api/3/action/";

/// CKAN dataset id for the LGA crime tables.
const DEFAULT_CRIME_DATASET_ID: &str = "nsw-local-government-area-crime-tables";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `LGATLAS_`)
/// 2. TOML config file at `~/.config/lgatlas/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data source configuration.
    pub sources: SourcesConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Map configuration.
    pub map: MapConfig,
    /// Dashboard configuration.
    pub dashboard: DashboardConfig,
}

/// Data source configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// URL serving the LGA boundary GeoJSON (plain or zipped).
    pub boundary_url: String,
    /// Feature property holding the region name in the boundary payload.
    pub boundary_name_property: String,
    /// CKAN action API base URL for indicator dataset discovery.
    pub ckan_base_url: String,
    /// CKAN dataset id queried for indicator tables.
    pub crime_dataset_id: String,
    /// Direct indicator CSV URL, bypassing CKAN discovery.
    pub indicator_csv_url: Option<String>,
    /// Portal API key, sent as `Authorization: apikey <key>` when set.
    pub api_key: Option<String>,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
    /// User agent sent with portal requests.
    pub user_agent: String,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/lgatlas/atlas.db`
    pub database_path: Option<PathBuf>,
    /// Number of fetch snapshots to retain.
    /// Set to 0 for unlimited.
    pub keep_snapshots: usize,
}

/// Map-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Initial map center latitude.
    pub center_lat: f64,
    /// Initial map center longitude.
    pub center_lon: f64,
    /// Initial zoom level.
    pub zoom: u8,
    /// Boundary simplification tolerance in degrees.
    /// Set to 0 to keep full geometry.
    pub simplify_tolerance: f64,
    /// Choropleth fill colors from lowest to highest value.
    pub color_ramp: Vec<String>,
    /// Region fill opacity.
    pub fill_opacity: f64,
    /// Region outline weight in pixels.
    pub stroke_weight: u32,
}

/// Dashboard-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Page title.
    pub title: String,
    /// Number of rows in the ranking table.
    pub table_limit: usize,
    /// Indicator shown when the page first loads.
    pub default_indicator: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            boundary_url: DEFAULT_BOUNDARY_URL.to_string(),
            boundary_name_property: DEFAULT_BOUNDARY_NAME_PROPERTY.to_string(),
            ckan_base_url: DEFAULT_CKAN_BASE_URL.to_string(),
            crime_dataset_id: DEFAULT_CRIME_DATASET_ID.to_string(),
            indicator_csv_url: None,
            api_key: None,
            timeout_secs: 30,
            user_agent: concat!("lgatlas/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Will be resolved to default at runtime
            keep_snapshots: 12,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            // Sydney
            center_lat: -33.8688,
            center_lon: 151.2093,
            zoom: 7,
            simplify_tolerance: 0.001,
            color_ramp: default_color_ramp(),
            fill_opacity: 0.7,
            stroke_weight: 1,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            title: "NSW Local Government Atlas".to_string(),
            table_limit: 20,
            default_indicator: Indicator::Population.as_str().to_string(),
        }
    }
}

/// Default choropleth ramp, light yellow to dark red.
fn default_color_ramp() -> Vec<String> {
    [
        "#FFEDA0", "#FED976", "#FEB24C", "#FD8D3C", "#FC4E2A", "#E31A1C", "#BD0026", "#800026",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `LGATLAS_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("LGATLAS_").split("_"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.sources.timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "timeout_secs must be greater than 0".to_string(),
            });
        }

        if self.sources.boundary_url.is_empty() {
            return Err(Error::ConfigValidation {
                message: "boundary_url must not be empty".to_string(),
            });
        }

        if !(-90.0..=90.0).contains(&self.map.center_lat) {
            return Err(Error::ConfigValidation {
                message: format!("center_lat {} outside -90..=90", self.map.center_lat),
            });
        }

        if !(-180.0..=180.0).contains(&self.map.center_lon) {
            return Err(Error::ConfigValidation {
                message: format!("center_lon {} outside -180..=180", self.map.center_lon),
            });
        }

        // Leaflet tile zoom range
        if !(1..=19).contains(&self.map.zoom) {
            return Err(Error::ConfigValidation {
                message: format!("zoom {} outside 1..=19", self.map.zoom),
            });
        }

        if self.map.simplify_tolerance < 0.0 {
            return Err(Error::ConfigValidation {
                message: "simplify_tolerance must not be negative".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.map.fill_opacity) {
            return Err(Error::ConfigValidation {
                message: format!("fill_opacity {} outside 0..=1", self.map.fill_opacity),
            });
        }

        if self.map.color_ramp.is_empty() {
            return Err(Error::ConfigValidation {
                message: "color_ramp must have at least one color".to_string(),
            });
        }

        let hex = regex::Regex::new(HEX_COLOR_PATTERN)
            .map_err(|e| Error::internal(format!("hex color pattern: {e}")))?;
        for color in &self.map.color_ramp {
            if !hex.is_match(color) {
                return Err(Error::ConfigValidation {
                    message: format!("invalid ramp color: {color}"),
                });
            }
        }

        if self.dashboard.table_limit == 0 {
            return Err(Error::ConfigValidation {
                message: "table_limit must be greater than 0".to_string(),
            });
        }

        if Indicator::from_str(&self.dashboard.default_indicator).is_err() {
            return Err(Error::ConfigValidation {
                message: format!(
                    "unknown default_indicator: {}",
                    self.dashboard.default_indicator
                ),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the HTTP timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.sources.timeout_secs)
    }

    /// Get the indicator shown when the dashboard first loads.
    ///
    /// Falls back to population if the configured value no longer parses;
    /// `validate` rejects that case at load time.
    #[must_use]
    pub fn default_indicator(&self) -> Indicator {
        Indicator::from_str(&self.dashboard.default_indicator).unwrap_or(Indicator::Population)
    }
}
