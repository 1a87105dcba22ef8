//! Command-line interface for lgatlas.
//!
//! This module provides the CLI structure and command handlers for the
//! `lgatlas` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    CacheCommand, ConfigCommand, ExportCommand, ExportFormat, FetchCommand, IndicatorArg,
    LocateCommand, OutputFormat, RankCommand, RenderCommand, ServeCommand, StatsCommand,
    StatusCommand,
};

/// lgatlas - NSW local government area atlas
///
/// Fetches open data for NSW local government areas, screens it for
/// quality, and renders interactive choropleth dashboards.
#[derive(Debug, Parser)]
#[command(name = "lgatlas")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch boundaries and indicator data into the local store
    Fetch(FetchCommand),

    /// Show store and fetch status
    Status(StatusCommand),

    /// Summarize an indicator across regions
    Stats(StatsCommand),

    /// Rank regions by an indicator
    Rank(RankCommand),

    /// Find the region containing a coordinate
    Locate(LocateCommand),

    /// Render the dashboard to a standalone HTML file
    Render(RenderCommand),

    /// Serve the dashboard over HTTP
    Serve(ServeCommand),

    /// Export stored data
    Export(ExportCommand),

    /// Manage the local store
    #[command(subcommand)]
    Cache(CacheCommand),

    /// View or modify configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
