//! Quality screening for fetched observations.
//!
//! This module screens decoded observations before storage, rejecting records
//! with implausible values so that portal glitches never reach the store.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::indicator::{Observation, ValueKind};

/// Years accepted by the screen.
const PLAUSIBLE_YEARS: std::ops::RangeInclusive<i32> = 1990..=2100;

/// Result of screening one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenResult {
    /// Observation passed all checks and is safe to store.
    Passed,

    /// Observation failed a check.
    Rejected {
        /// Why the observation was rejected.
        reason: String,
    },
}

/// Mode of operation for the quality screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenMode {
    /// Drop rejected observations and keep going.
    #[default]
    Drop,

    /// Abort the ingest on the first rejected observation.
    Strict,
}

/// Quality screen applied to every batch of fetched observations.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityScreen {
    mode: ScreenMode,
}

impl QualityScreen {
    /// Create a screen with the default drop mode.
    #[must_use]
    pub fn new() -> Self {
        Self::with_mode(ScreenMode::Drop)
    }

    /// Create a screen with the given mode.
    #[must_use]
    pub fn with_mode(mode: ScreenMode) -> Self {
        Self { mode }
    }

    /// The configured mode.
    #[must_use]
    pub fn mode(&self) -> ScreenMode {
        self.mode
    }

    /// Screen a single observation.
    #[must_use]
    pub fn screen(&self, observation: &Observation) -> ScreenResult {
        if observation.region.trim().is_empty() {
            return ScreenResult::Rejected {
                reason: "empty region name".to_string(),
            };
        }

        if !observation.value.is_finite() {
            return ScreenResult::Rejected {
                reason: "non-finite value".to_string(),
            };
        }

        if observation.value < 0.0 {
            return ScreenResult::Rejected {
                reason: "negative value".to_string(),
            };
        }

        if observation.indicator.value_kind() == ValueKind::Percent && observation.value > 100.0 {
            return ScreenResult::Rejected {
                reason: "percentage above 100".to_string(),
            };
        }

        if !PLAUSIBLE_YEARS.contains(&observation.year) {
            return ScreenResult::Rejected {
                reason: format!("year {} outside plausible range", observation.year),
            };
        }

        ScreenResult::Passed
    }

    /// Screen a batch, applying the configured mode to rejects.
    ///
    /// Returns the surviving observations and the number dropped.
    ///
    /// # Errors
    ///
    /// In strict mode, returns an error describing the first rejected
    /// observation.
    pub fn apply(&self, observations: Vec<Observation>) -> Result<(Vec<Observation>, usize)> {
        let mut kept = Vec::with_capacity(observations.len());
        let mut dropped = 0usize;

        for observation in observations {
            match self.screen(&observation) {
                ScreenResult::Passed => kept.push(observation),
                ScreenResult::Rejected { reason } => match self.mode {
                    ScreenMode::Strict => {
                        return Err(Error::ObservationRejected {
                            reason: format!(
                                "{reason} ({} {} {})",
                                observation.region, observation.indicator, observation.year
                            ),
                        });
                    }
                    ScreenMode::Drop => {
                        debug!(
                            region = %observation.region,
                            indicator = %observation.indicator,
                            %reason,
                            "dropping observation"
                        );
                        dropped += 1;
                    }
                },
            }
        }

        if dropped > 0 {
            warn!("dropped {dropped} observations during quality screening");
        }

        Ok((kept, dropped))
    }
}
