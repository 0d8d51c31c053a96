//! Engine configuration, read once and held for the process lifetime.

use serde::{Deserialize, Serialize};

use crate::Verbosity;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub verbosity: Verbosity,
    /// When off, the orientation factor is forced to 1 and panels produce
    /// as if always facing the star.
    pub solar_orientation_matters: bool,
    /// When off, the temperature efficiency factor is forced to 1.
    pub solar_temperature_matters: bool,
    /// Whether vessels still sitting on the pad run the background tick.
    pub simulate_prelaunch: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::Silent,
            solar_orientation_matters: true,
            solar_temperature_matters: true,
            simulate_prelaunch: false,
        }
    }
}
