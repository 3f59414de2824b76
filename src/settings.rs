use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

use crate::error::{CalibrationError, CalibrationResult};
use crate::profile::{ConnectorProfile, DEFAULT_PROFILE};
use crate::validation::ThresholdRule;

pub const DEFAULT_MAX_FORCE_NEWTONS: f64 = 10.0;
pub const DEFAULT_TICK_PERIOD_SECONDS: f64 = 0.5;
pub const DEFAULT_SOURCE_TIMEOUT_SECONDS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BenchSettings {
    pub connector_profile: String,
    pub max_force_newtons: f64,
    pub tick_period_seconds: f64,
    /// Longest a single pull from the reading source may take before the run
    /// is failed.
    pub source_timeout_seconds: f64,
    pub threshold: ThresholdRule,
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            connector_profile: DEFAULT_PROFILE.into(),
            max_force_newtons: DEFAULT_MAX_FORCE_NEWTONS,
            tick_period_seconds: DEFAULT_TICK_PERIOD_SECONDS,
            source_timeout_seconds: DEFAULT_SOURCE_TIMEOUT_SECONDS,
            threshold: ThresholdRule::default(),
        }
    }
}

impl BenchSettings {
    pub fn validate(&self) -> CalibrationResult<()> {
        ConnectorProfile::lookup(&self.connector_profile)?;

        if !self.max_force_newtons.is_finite() || self.max_force_newtons < 0.0 {
            return Err(CalibrationError::InvalidSettings(format!(
                "maxForceNewtons must be a non-negative number, got {}",
                self.max_force_newtons
            )));
        }
        if !self.tick_period_seconds.is_finite() || self.tick_period_seconds <= 0.0 {
            return Err(CalibrationError::InvalidSettings(format!(
                "tickPeriodSeconds must be positive, got {}",
                self.tick_period_seconds
            )));
        }
        if !self.source_timeout_seconds.is_finite() || self.source_timeout_seconds <= 0.0 {
            return Err(CalibrationError::InvalidSettings(format!(
                "sourceTimeoutSeconds must be positive, got {}",
                self.source_timeout_seconds
            )));
        }
        if let ThresholdRule::Band { tolerance_newtons } = self.threshold {
            if !tolerance_newtons.is_finite() || tolerance_newtons < 0.0 {
                return Err(CalibrationError::InvalidSettings(format!(
                    "band toleranceNewtons must be a non-negative number, got {tolerance_newtons}"
                )));
            }
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(self.tick_period_seconds)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.source_timeout_seconds)
    }
}

/// Bench settings backed by a JSON file. A missing or unreadable file yields
/// defaults; writes go straight back to disk.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<BenchSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring malformed settings at {}: {err}",
                    path.display()
                );
                BenchSettings::default()
            })
        } else {
            BenchSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> BenchSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: BenchSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &BenchSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
