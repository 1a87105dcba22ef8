//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::indicator::Indicator;

/// Fetch command arguments.
#[derive(Debug, Args)]
pub struct FetchCommand {
    /// Use bundled sample data without touching the network
    #[arg(long)]
    pub offline: bool,

    /// Fail instead of falling back to sample data on portal errors
    #[arg(long)]
    pub no_fallback: bool,

    /// Refetch boundaries even when they are already cached
    #[arg(short, long)]
    pub force: bool,

    /// Abort the fetch if any observation fails the quality screen
    #[arg(long)]
    pub strict: bool,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Stats command arguments.
#[derive(Debug, Args)]
pub struct StatsCommand {
    /// Indicator to summarize
    #[arg(value_enum)]
    pub indicator: IndicatorArg,

    /// Year to summarize (defaults to the latest stored year)
    #[arg(short, long)]
    pub year: Option<i32>,

    /// Restrict the summary to these regions
    #[arg(short, long)]
    pub region: Vec<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Rank command arguments.
#[derive(Debug, Args)]
pub struct RankCommand {
    /// Indicator to rank by
    #[arg(value_enum)]
    pub indicator: IndicatorArg,

    /// Year to rank (defaults to the latest stored year)
    #[arg(short, long)]
    pub year: Option<i32>,

    /// Maximum number of regions listed (0 for all)
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Locate command arguments.
#[derive(Debug, Args)]
pub struct LocateCommand {
    /// Latitude in decimal degrees
    #[arg(allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude in decimal degrees
    #[arg(allow_negative_numbers = true)]
    pub lon: f64,

    /// Year for the region profile (defaults to the latest stored year)
    #[arg(short, long)]
    pub year: Option<i32>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Render command arguments.
#[derive(Debug, Args)]
pub struct RenderCommand {
    /// Where to write the dashboard HTML
    #[arg(short, long, default_value = "atlas.html")]
    pub output: PathBuf,

    /// Year to show (defaults to the latest stored year)
    #[arg(short, long)]
    pub year: Option<i32>,

    /// Initially selected indicator
    #[arg(short, long, value_enum)]
    pub indicator: Option<IndicatorArg>,

    /// Limit the map to these regions
    #[arg(short, long)]
    pub region: Vec<String>,

    /// Override the page title
    #[arg(short, long)]
    pub title: Option<String>,
}

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Year to serve by default (defaults to the latest stored year)
    #[arg(short, long)]
    pub year: Option<i32>,
}

/// Export command arguments.
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// What to export
    #[arg(value_enum)]
    pub format: ExportFormat,

    /// Where to write the export (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Year to export (defaults to the latest stored year)
    #[arg(short, long)]
    pub year: Option<i32>,
}

/// Cache maintenance commands.
#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Show store statistics
    Stats {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Delete all stored boundaries, observations and snapshots
    Clear {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Indicator argument for selecting what to summarize or rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IndicatorArg {
    /// Resident population
    Population,
    /// Median weekly household income
    MedianIncome,
    /// Unemployment rate
    UnemploymentRate,
    /// Median house sale price
    HousingMedian,
    /// Criminal incidents per 100,000 residents
    CrimeRate,
}

impl From<IndicatorArg> for Indicator {
    fn from(arg: IndicatorArg) -> Self {
        match arg {
            IndicatorArg::Population => Self::Population,
            IndicatorArg::MedianIncome => Self::MedianIncome,
            IndicatorArg::UnemploymentRate => Self::UnemploymentRate,
            IndicatorArg::HousingMedian => Self::HousingMedian,
            IndicatorArg::CrimeRate => Self::CrimeRate,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Formatted table
    #[default]
    Table,
    /// Comma-separated values
    Csv,
    /// JSON output
    Json,
}

/// What the export command can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Styled GeoJSON feature collection
    Geojson,
    /// Wide CSV table of indicator values
    Csv,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_arg_conversion() {
        assert_eq!(
            Indicator::from(IndicatorArg::Population),
            Indicator::Population
        );
        assert_eq!(
            Indicator::from(IndicatorArg::MedianIncome),
            Indicator::MedianIncome
        );
        assert_eq!(
            Indicator::from(IndicatorArg::UnemploymentRate),
            Indicator::UnemploymentRate
        );
        assert_eq!(
            Indicator::from(IndicatorArg::HousingMedian),
            Indicator::HousingMedian
        );
        assert_eq!(Indicator::from(IndicatorArg::CrimeRate), Indicator::CrimeRate);
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Table);
    }

    #[test]
    fn test_fetch_command_debug() {
        let cmd = FetchCommand {
            offline: true,
            no_fallback: false,
            force: false,
            strict: false,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("offline"));
    }

    #[test]
    fn test_stats_command_debug() {
        let cmd = StatsCommand {
            indicator: IndicatorArg::Population,
            year: Some(2024),
            region: vec!["Sydney".to_string()],
            json: false,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Population"));
        assert!(debug_str.contains("Sydney"));
    }

    #[test]
    fn test_rank_command_debug() {
        let cmd = RankCommand {
            indicator: IndicatorArg::CrimeRate,
            year: None,
            limit: 10,
            format: OutputFormat::Table,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("limit"));
    }

    #[test]
    fn test_cache_command_debug() {
        let cmd = CacheCommand::Clear { yes: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Clear"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }

    #[test]
    fn test_export_format_debug() {
        let format = ExportFormat::Geojson;
        let debug_str = format!("{format:?}");
        assert_eq!(debug_str, "Geojson");
    }

    #[test]
    fn test_indicator_arg_clone() {
        let arg = IndicatorArg::HousingMedian;
        let cloned = arg;
        assert_eq!(arg, cloned);
    }
}
