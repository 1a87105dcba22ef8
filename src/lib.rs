//! `lgatlas` - A choropleth atlas for NSW local government areas
//!
//! This library provides the core functionality for fetching open data about
//! NSW local government areas, screening it for quality, storing it locally
//! and joining it into interactive choropleth dashboards.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod boundary;
pub mod choropleth;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod indicator;
pub mod logging;
pub mod screen;
pub mod server;
pub mod sources;
pub mod stats;
pub mod storage;

pub use boundary::RegionBoundary;
pub use config::Config;
pub use dashboard::Dashboard;
pub use error::{Error, Result};
pub use indicator::{Indicator, Observation};
pub use logging::init_logging;
pub use screen::{QualityScreen, ScreenMode};
pub use sources::{FetchOptions, FetchReport};
pub use storage::{Storage, StoreStats};
