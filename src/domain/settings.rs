//! Fit configuration.
//!
//! All tunables travel as an explicit `FitSettings` value; nothing in the
//! fitting core reads ambient state. Settings can come from defaults, a JSON
//! file (unknown keys are rejected), CLI flags, or `set_option` by name.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::DistributionFamily;
use crate::error::SettingError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitSettings {
    pub distribution_family: DistributionFamily,
    pub component_count: usize,

    /// Maximum number of basin-hopping hops.
    pub global_max_iterations: usize,
    /// Stop after this many consecutive hops without a new lowest minimum.
    pub global_success_iterations: usize,
    /// Half-width of the uniform hop displacement (per coordinate).
    pub global_step_size: f64,
    /// Metropolis temperature.
    pub global_temperature: f64,
    /// Seed for the hop displacement RNG.
    pub seed: u64,

    /// Objective tolerance of the local solves inside the global stage.
    pub local_tolerance: f64,
    pub local_max_iterations: usize,

    /// Objective tolerance of the final refinement.
    pub final_tolerance: f64,
    pub final_max_iterations: usize,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            distribution_family: DistributionFamily::Weibull,
            component_count: 2,
            global_max_iterations: 100,
            global_success_iterations: 3,
            global_step_size: 1.0,
            global_temperature: 1.0,
            seed: 42,
            local_tolerance: 1e-8,
            local_max_iterations: 500,
            final_tolerance: 1e-100,
            final_max_iterations: 1000,
        }
    }
}

impl FitSettings {
    /// Numeric option names accepted by [`FitSettings::set_option`].
    pub const OPTION_NAMES: [&'static str; 10] = [
        "component_count",
        "global_max_iterations",
        "global_success_iterations",
        "global_step_size",
        "global_temperature",
        "seed",
        "local_tolerance",
        "local_max_iterations",
        "final_tolerance",
        "final_max_iterations",
    ];

    pub fn from_json_str(text: &str) -> Result<Self, SettingError> {
        let settings: FitSettings =
            serde_json::from_str(text).map_err(|e| SettingError::Read(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, SettingError> {
        let file = File::open(path)
            .map_err(|e| SettingError::Read(format!("'{}': {e}", path.display())))?;
        let settings: FitSettings =
            serde_json::from_reader(file).map_err(|e| SettingError::Read(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingError> {
        if self.component_count < 1 {
            return Err(SettingError::InvalidComponentCount(self.component_count));
        }
        positive_count("global_max_iterations", self.global_max_iterations)?;
        positive_count("global_success_iterations", self.global_success_iterations)?;
        positive_count("local_max_iterations", self.local_max_iterations)?;
        positive_count("final_max_iterations", self.final_max_iterations)?;
        if !(self.global_step_size.is_finite() && self.global_step_size > 0.0) {
            return Err(invalid("global_step_size", "must be finite and > 0"));
        }
        if !(self.global_temperature.is_finite() && self.global_temperature >= 0.0) {
            return Err(invalid("global_temperature", "must be finite and >= 0"));
        }
        if !(self.local_tolerance.is_finite() && self.local_tolerance >= 0.0) {
            return Err(invalid("local_tolerance", "must be finite and >= 0"));
        }
        if !(self.final_tolerance.is_finite() && self.final_tolerance >= 0.0) {
            return Err(invalid("final_tolerance", "must be finite and >= 0"));
        }
        Ok(())
    }

    /// Set one numeric option by its snake_case name.
    ///
    /// The settings are left untouched when the name is unknown or the new
    /// value fails validation.
    pub fn set_option(&mut self, name: &str, value: f64) -> Result<(), SettingError> {
        let mut next = self.clone();
        match name {
            "component_count" => next.component_count = as_count("component_count", value)?,
            "global_max_iterations" => {
                next.global_max_iterations = as_count("global_max_iterations", value)?
            }
            "global_success_iterations" => {
                next.global_success_iterations = as_count("global_success_iterations", value)?
            }
            "global_step_size" => next.global_step_size = value,
            "global_temperature" => next.global_temperature = value,
            "seed" => next.seed = as_count("seed", value)? as u64,
            "local_tolerance" => next.local_tolerance = value,
            "local_max_iterations" => {
                next.local_max_iterations = as_count("local_max_iterations", value)?
            }
            "final_tolerance" => next.final_tolerance = value,
            "final_max_iterations" => {
                next.final_max_iterations = as_count("final_max_iterations", value)?
            }
            "distribution_family" => {
                return Err(invalid("distribution_family", "not numeric; set the family directly"));
            }
            other => return Err(SettingError::UnknownOption(other.to_string())),
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

fn invalid(name: &'static str, reason: &str) -> SettingError {
    SettingError::InvalidValue {
        name,
        reason: reason.to_string(),
    }
}

fn positive_count(name: &'static str, value: usize) -> Result<(), SettingError> {
    if value == 0 {
        return Err(invalid(name, "must be >= 1"));
    }
    Ok(())
}

fn as_count(name: &'static str, value: f64) -> Result<usize, SettingError> {
    if !(value.is_finite() && value >= 0.0 && value.fract() == 0.0) {
        return Err(invalid(name, "must be a non-negative integer"));
    }
    Ok(value as usize)
}
