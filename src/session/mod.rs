pub mod state;

pub use state::{
    ClassifiedContact, ForceReading, ResistanceReading, SessionState, Snapshot, VoltageInput,
};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{CalibrationError, CalibrationResult};
use crate::profile::ConnectorProfile;

struct SessionInner {
    voltage: VoltageInput,
    snapshot: Snapshot,
}

/// Owns the bench state for one connector under test. Every change builds a
/// replacement `Snapshot` and swaps it in under the lock, so readers never
/// observe a half-applied tick.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    pub fn new(profile: &'static ConnectorProfile) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                voltage: VoltageInput::default(),
                snapshot: Snapshot::idle(*profile),
            })),
        }
    }

    pub async fn current_snapshot(&self) -> Snapshot {
        self.inner.lock().await.snapshot.clone()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.snapshot.state
    }

    pub async fn profile(&self) -> ConnectorProfile {
        self.inner.lock().await.snapshot.profile
    }

    /// Parse and store both probe voltages. On failure nothing changes. A
    /// stopped run keeps its snapshot; the values only show after reset.
    pub async fn set_voltage(&self, v1: &str, v2: &str) -> CalibrationResult<f64> {
        let voltage = parse_voltages(v1, v2)?;
        let mut guard = self.inner.lock().await;
        guard.apply_voltage(voltage);
        Ok(voltage.average().unwrap_or_default())
    }

    /// Switch connector type. Always lands in Idle with an empty history.
    pub async fn set_profile(&self, profile: &'static ConnectorProfile) {
        let mut guard = self.inner.lock().await;
        guard.voltage = VoltageInput::default();
        guard.snapshot = Snapshot::idle(*profile);
    }

    pub(crate) async fn reset(&self) {
        let mut guard = self.inner.lock().await;
        let profile = guard.snapshot.profile;
        guard.voltage = VoltageInput::default();
        guard.snapshot = Snapshot {
            cleared: true,
            ..Snapshot::idle(profile)
        };
    }

    pub(crate) async fn begin_run(
        &self,
        voltage: VoltageInput,
        requested_force: f64,
        run_id: String,
        started_at: DateTime<Utc>,
    ) {
        let mut guard = self.inner.lock().await;
        guard.voltage = voltage;
        let next = Snapshot {
            state: SessionState::Running,
            connector_statuses: Vec::new(),
            resistance_history: Vec::new(),
            avg_voltage: voltage.average(),
            requested_force_newtons: Some(requested_force),
            run_id: Some(run_id),
            started_at: Some(started_at),
            tick_count: 0,
            error: None,
            cleared: false,
            ..guard.snapshot.clone()
        };
        guard.snapshot = next;
    }

    /// Append one tick. Rejected unless the session is still running the
    /// same run, so a tick that races with stop/reset never lands.
    pub(crate) async fn publish_tick(
        &self,
        run_id: &str,
        statuses: Vec<ClassifiedContact>,
        reading: ResistanceReading,
    ) -> bool {
        let mut guard = self.inner.lock().await;
        if !guard.is_running(run_id) {
            return false;
        }

        let previous = &guard.snapshot;
        let mut history = Vec::with_capacity(previous.resistance_history.len() + 1);
        history.extend_from_slice(&previous.resistance_history);
        history.push(reading);

        let next = Snapshot {
            connector_statuses: statuses,
            resistance_history: history,
            avg_voltage: guard.voltage.average(),
            tick_count: previous.tick_count + 1,
            ..previous.clone()
        };
        guard.snapshot = next;
        true
    }

    pub(crate) async fn mark_stopped(&self) {
        let mut guard = self.inner.lock().await;
        if guard.snapshot.state == SessionState::Running {
            guard.snapshot = Snapshot {
                state: SessionState::Stopped,
                ..guard.snapshot.clone()
            };
        }
    }

    /// Record a source failure for `run_id` and stop the session.
    pub(crate) async fn fail(&self, run_id: &str, error: &CalibrationError) {
        let mut guard = self.inner.lock().await;
        if !guard.is_running(run_id) {
            return;
        }
        guard.snapshot = Snapshot {
            state: SessionState::Stopped,
            error: Some(error.to_string()),
            ..guard.snapshot.clone()
        };
    }
}

impl SessionInner {
    fn is_running(&self, run_id: &str) -> bool {
        self.snapshot.state == SessionState::Running
            && self.snapshot.run_id.as_deref() == Some(run_id)
    }

    fn apply_voltage(&mut self, voltage: VoltageInput) {
        self.voltage = voltage;
        if self.snapshot.state == SessionState::Stopped {
            return;
        }
        self.snapshot = Snapshot {
            avg_voltage: voltage.average(),
            ..self.snapshot.clone()
        };
    }
}

pub fn parse_voltages(v1: &str, v2: &str) -> CalibrationResult<VoltageInput> {
    Ok(VoltageInput {
        v1: Some(parse_voltage("v1", v1)?),
        v2: Some(parse_voltage("v2", v2)?),
    })
}

fn parse_voltage(field: &'static str, raw: &str) -> CalibrationResult<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| CalibrationError::InvalidVoltageInput {
            field,
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_a() -> &'static ConnectorProfile {
        ConnectorProfile::lookup("Type A").unwrap()
    }

    fn contact(index: usize, newtons: f64) -> ClassifiedContact {
        ClassifiedContact {
            contact_index: index,
            newtons,
            pass: true,
        }
    }

    #[tokio::test]
    async fn set_voltage_computes_average() {
        let session = Session::new(type_a());
        let avg = session.set_voltage("3", " 5.0 ").await.unwrap();
        assert_eq!(avg, 4.0);
        assert_eq!(session.current_snapshot().await.avg_voltage, Some(4.0));
    }

    #[tokio::test]
    async fn invalid_voltage_leaves_average_unset() {
        let session = Session::new(type_a());
        let err = session.set_voltage("abc", "1").await.unwrap_err();

        assert!(matches!(
            err,
            CalibrationError::InvalidVoltageInput { field: "v1", .. }
        ));
        assert_eq!(session.current_snapshot().await.avg_voltage, None);
    }

    #[tokio::test]
    async fn invalid_voltage_keeps_previous_values() {
        let session = Session::new(type_a());
        session.set_voltage("2", "4").await.unwrap();
        assert!(session.set_voltage("1", "NaN").await.is_err());
        assert!(session.set_voltage("1", "inf").await.is_err());
        assert_eq!(session.current_snapshot().await.avg_voltage, Some(3.0));
    }

    #[tokio::test]
    async fn ticks_accumulate_history_only_while_running() {
        let session = Session::new(type_a());
        let reading = ResistanceReading {
            ohms: 20.0,
            elapsed_seconds: 0.0,
        };
        assert!(!session.publish_tick("run", vec![], reading).await);

        session
            .begin_run(parse_voltages("3", "5").unwrap(), 5.0, "run".into(), Utc::now())
            .await;
        assert!(session.publish_tick("run", vec![contact(0, 1.0)], reading).await);
        assert!(!session.publish_tick("other", vec![], reading).await);

        let second = ResistanceReading {
            ohms: 30.0,
            elapsed_seconds: 0.5,
        };
        assert!(session.publish_tick("run", vec![contact(0, 2.0)], second).await);

        let snapshot = session.current_snapshot().await;
        assert_eq!(snapshot.state, SessionState::Running);
        assert_eq!(snapshot.resistance_history, vec![reading, second]);
        assert_eq!(snapshot.connector_statuses, vec![contact(0, 2.0)]);
        assert_eq!(snapshot.tick_count, 2);
        assert_eq!(snapshot.avg_voltage, Some(4.0));

        session.mark_stopped().await;
        assert!(!session.publish_tick("run", vec![], reading).await);
        assert_eq!(session.state().await, SessionState::Stopped);
    }

    #[tokio::test]
    async fn failure_stops_and_records_error() {
        let session = Session::new(type_a());
        session
            .begin_run(VoltageInput::default(), 1.0, "run".into(), Utc::now())
            .await;
        session
            .fail("run", &CalibrationError::SourceFailure("probe offline".into()))
            .await;

        let snapshot = session.current_snapshot().await;
        assert_eq!(snapshot.state, SessionState::Stopped);
        assert_eq!(
            snapshot.error.as_deref(),
            Some("reading source failed: probe offline")
        );
    }

    #[tokio::test]
    async fn stopped_snapshot_ignores_voltage_changes() {
        let session = Session::new(type_a());
        session
            .begin_run(parse_voltages("3", "5").unwrap(), 1.0, "run".into(), Utc::now())
            .await;
        session.mark_stopped().await;
        let stopped = session.current_snapshot().await;

        assert_eq!(session.set_voltage("10", "20").await.unwrap(), 15.0);
        assert_eq!(session.current_snapshot().await, stopped);
        assert_eq!(stopped.avg_voltage, Some(4.0));
    }

    #[tokio::test]
    async fn reset_shows_reset_status_until_next_run() {
        let session = Session::new(type_a());
        assert_eq!(session.current_snapshot().await.status_label(), "Ready");

        session.reset().await;
        assert_eq!(session.current_snapshot().await.status_label(), "Reset");

        session
            .begin_run(VoltageInput::default(), 1.0, "run".into(), Utc::now())
            .await;
        assert_eq!(session.current_snapshot().await.status_label(), "Started");
    }

    #[tokio::test]
    async fn profile_change_returns_to_idle() {
        let session = Session::new(type_a());
        session.set_voltage("1", "2").await.unwrap();
        session
            .set_profile(ConnectorProfile::lookup("Type B").unwrap())
            .await;

        let snapshot = session.current_snapshot().await;
        assert_eq!(snapshot.state, SessionState::Idle);
        assert_eq!(snapshot.profile.contact_count, 8);
        assert_eq!(snapshot.avg_voltage, None);
    }
}
