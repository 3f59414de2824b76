use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::profile::ConnectorProfile;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Idle
    }
}

impl SessionState {
    /// Status-bar text shown by the bench UI.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Ready",
            SessionState::Running => "Started",
            SessionState::Stopped => "Finished",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForceReading {
    pub contact_index: usize,
    pub newtons: f64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResistanceReading {
    pub ohms: f64,
    pub elapsed_seconds: f64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedContact {
    pub contact_index: usize,
    pub newtons: f64,
    pub pass: bool,
}

impl fmt::Display for ClassifiedContact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Connector {}: {} ({:.2} N)",
            self.contact_index + 1,
            if self.pass { "OK" } else { "Not OK" },
            self.newtons
        )
    }
}

/// The two voltage probes, as last accepted from the operator.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoltageInput {
    pub v1: Option<f64>,
    pub v2: Option<f64>,
}

impl VoltageInput {
    pub fn average(&self) -> Option<f64> {
        match (self.v1, self.v2) {
            (Some(v1), Some(v2)) => Some((v1 + v2) / 2.0),
            _ => None,
        }
    }
}

/// Complete view of a session. Replaced wholesale on every change, never
/// patched in place.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub state: SessionState,
    pub profile: ConnectorProfile,
    pub connector_statuses: Vec<ClassifiedContact>,
    pub resistance_history: Vec<ResistanceReading>,
    pub avg_voltage: Option<f64>,
    pub requested_force_newtons: Option<f64>,
    pub run_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub tick_count: u64,
    pub error: Option<String>,
    /// Set when the operator reset the bench; cleared by the next run.
    pub cleared: bool,
}

impl Snapshot {
    pub fn idle(profile: ConnectorProfile) -> Self {
        Self {
            state: SessionState::Idle,
            profile,
            connector_statuses: Vec::new(),
            resistance_history: Vec::new(),
            avg_voltage: None,
            requested_force_newtons: None,
            run_id: None,
            started_at: None,
            tick_count: 0,
            error: None,
            cleared: false,
        }
    }

    /// Status-bar text; an explicit reset reads "Reset" rather than "Ready".
    pub fn status_label(&self) -> &'static str {
        if self.state == SessionState::Idle && self.cleared {
            "Reset"
        } else {
            self.state.label()
        }
    }

    pub fn latest_resistance(&self) -> Option<&ResistanceReading> {
        self.resistance_history.last()
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.latest_resistance()
            .map(|reading| reading.elapsed_seconds)
            .unwrap_or(0.0)
    }

    /// True once statuses exist and every contact passed.
    pub fn all_contacts_pass(&self) -> bool {
        !self.connector_statuses.is_empty() && self.connector_statuses.iter().all(|c| c.pass)
    }

    pub fn contact_labels(&self) -> Vec<String> {
        if self.connector_statuses.is_empty() {
            return (1..=self.profile.contact_count)
                .map(|n| format!("Connector {n}: Not Placed"))
                .collect();
        }
        self.connector_statuses.iter().map(ToString::to_string).collect()
    }
}
