//! Engine configuration.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CrossCatError, Result};

/// Configuration shared by [`PredictiveEngine`](crate::PredictiveEngine) and
/// [`Ensemble`](crate::Ensemble).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fan ensemble chains out over the rayon thread pool.
    pub parallel: bool,
    /// Half-width of the Gaussian imputation confidence band, as a fraction
    /// of the column's population standard deviation.
    pub confidence_band: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            confidence_band: 0.1,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable parallel chain evaluation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the Gaussian confidence band fraction.
    pub fn with_confidence_band(mut self, band: f64) -> Self {
        self.confidence_band = band;
        self
    }

    /// Check that every setting is usable.
    pub fn validate(&self) -> Result<()> {
        if !self.confidence_band.is_finite() || self.confidence_band <= 0.0 {
            return Err(CrossCatError::Config(format!(
                "confidence_band must be a positive finite number, got {}",
                self.confidence_band
            )));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let file = File::open(path).map_err(|e| {
            CrossCatError::Persistence(format!(
                "Failed to open config '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: EngineConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }
}
