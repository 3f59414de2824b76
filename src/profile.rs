use serde::Serialize;

use crate::error::{CalibrationError, CalibrationResult};

pub const DEFAULT_PROFILE: &str = "Type A";

/// A connector family: how many contact points it has and the nominal
/// insertion force expected at each of them.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorProfile {
    pub name: &'static str,
    pub contact_count: usize,
    #[serde(skip)]
    pub nominal_newtons: &'static [f64],
}

static REGISTRY: [ConnectorProfile; 3] = [
    ConnectorProfile {
        name: "Type A",
        contact_count: 4,
        nominal_newtons: &[10.0, 20.0, 30.0, 40.0],
    },
    ConnectorProfile {
        name: "Type B",
        contact_count: 8,
        nominal_newtons: &[10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0],
    },
    ConnectorProfile {
        name: "Type C",
        contact_count: 2,
        nominal_newtons: &[15.0, 25.0],
    },
];

impl ConnectorProfile {
    pub fn registry() -> &'static [ConnectorProfile] {
        &REGISTRY
    }

    pub fn lookup(name: &str) -> CalibrationResult<&'static ConnectorProfile> {
        REGISTRY
            .iter()
            .find(|profile| profile.name == name)
            .ok_or_else(|| CalibrationError::UnknownProfile(name.to_string()))
    }

    pub fn default_profile() -> &'static ConnectorProfile {
        &REGISTRY[0]
    }

    /// Nominal force for a contact, if the index is in range.
    pub fn nominal_for(&self, contact_index: usize) -> Option<f64> {
        self.nominal_newtons.get(contact_index).copied()
    }
}
