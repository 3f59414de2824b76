use serde::{Deserialize, Serialize};

use crate::profile::ConnectorProfile;

/// Tolerance used by the band rule when none is configured.
pub const DEFAULT_BAND_TOLERANCE_NEWTONS: f64 = 10.0;

/// Ceiling check: a reading passes iff it is a real, non-negative force no
/// greater than `max_force`. NaN on either side fails.
pub fn classify(newtons: f64, max_force: f64) -> bool {
    is_physical(newtons) && newtons <= max_force
}

/// Band check: a reading passes iff it lies within `tolerance` of `nominal`.
pub fn classify_band(newtons: f64, nominal: f64, tolerance: f64) -> bool {
    is_physical(newtons) && (newtons - nominal).abs() <= tolerance
}

fn is_physical(newtons: f64) -> bool {
    !newtons.is_nan() && newtons >= 0.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum ThresholdRule {
    Ceiling,
    #[serde(rename_all = "camelCase")]
    Band { tolerance_newtons: f64 },
}

impl Default for ThresholdRule {
    fn default() -> Self {
        ThresholdRule::Ceiling
    }
}

/// Classifies per-contact force readings. Independent of sampling cadence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdValidator {
    Ceiling { max_newtons: f64 },
    Band { tolerance_newtons: f64 },
}

impl ThresholdValidator {
    pub fn from_rule(rule: ThresholdRule, max_newtons: f64) -> Self {
        match rule {
            ThresholdRule::Ceiling => ThresholdValidator::Ceiling { max_newtons },
            ThresholdRule::Band { tolerance_newtons } => {
                ThresholdValidator::Band { tolerance_newtons }
            }
        }
    }

    pub fn classify_contact(
        &self,
        profile: &ConnectorProfile,
        contact_index: usize,
        newtons: f64,
    ) -> bool {
        match *self {
            ThresholdValidator::Ceiling { max_newtons } => classify(newtons, max_newtons),
            ThresholdValidator::Band { tolerance_newtons } => profile
                .nominal_for(contact_index)
                .map(|nominal| classify_band(newtons, nominal, tolerance_newtons))
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_is_inclusive() {
        assert!(classify(10.0, 10.0));
        assert!(classify(0.0, 10.0));
        assert!(classify(9.99, 10.0));
        assert!(!classify(10.01, 10.0));
    }

    #[test]
    fn invalid_readings_fail_without_panicking() {
        assert!(!classify(f64::NAN, 10.0));
        assert!(!classify(-0.5, 10.0));
        assert!(!classify(5.0, f64::NAN));
        assert!(!classify(f64::INFINITY, 10.0));
        assert!(classify(5.0, f64::INFINITY));
    }

    #[test]
    fn band_checks_distance_from_nominal() {
        assert!(classify_band(25.0, 30.0, 10.0));
        assert!(classify_band(40.0, 30.0, 10.0));
        assert!(!classify_band(40.5, 30.0, 10.0));
        assert!(!classify_band(f64::NAN, 30.0, 10.0));
    }

    #[test]
    fn band_validator_uses_per_contact_nominal() {
        let profile = ConnectorProfile::lookup("Type A").unwrap();
        let validator = ThresholdValidator::Band {
            tolerance_newtons: DEFAULT_BAND_TOLERANCE_NEWTONS,
        };

        assert!(validator.classify_contact(profile, 0, 12.0));
        assert!(!validator.classify_contact(profile, 0, 35.0));
        assert!(validator.classify_contact(profile, 3, 35.0));
        // out of range contact never passes
        assert!(!validator.classify_contact(profile, 9, 10.0));
    }

    #[test]
    fn rule_deserializes_from_tagged_json() {
        let ceiling: ThresholdRule = serde_json::from_str(r#"{"mode":"ceiling"}"#).unwrap();
        assert_eq!(ceiling, ThresholdRule::Ceiling);

        let band: ThresholdRule =
            serde_json::from_str(r#"{"mode":"band","toleranceNewtons":2.5}"#).unwrap();
        assert_eq!(
            ThresholdValidator::from_rule(band, 10.0),
            ThresholdValidator::Band {
                tolerance_newtons: 2.5
            }
        );
    }
}
