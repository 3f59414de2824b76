use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{info, warn};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::{CalibrationError, CalibrationResult},
    profile::ConnectorProfile,
    sampling::{SamplingController, SamplingJob},
    session::{parse_voltages, Session, SessionState, Snapshot},
    settings::BenchSettings,
    source::SharedSource,
    validation::ThresholdValidator,
};

/// Public entry point for the bench: validates operator input and drives the
/// session and its sampling worker through Idle/Running/Stopped.
///
/// Cheap to clone; clones share the same session and worker.
#[derive(Clone)]
pub struct CalibrationController {
    session: Session,
    source: SharedSource,
    sampling: Arc<Mutex<SamplingController>>,
    validator: ThresholdValidator,
    max_force_newtons: f64,
    tick_period: Duration,
    source_timeout: Duration,
}

impl CalibrationController {
    pub fn new(settings: &BenchSettings, source: SharedSource) -> CalibrationResult<Self> {
        settings.validate()?;
        let profile = ConnectorProfile::lookup(&settings.connector_profile)?;

        Ok(Self {
            session: Session::new(profile),
            source,
            sampling: Arc::new(Mutex::new(SamplingController::new())),
            validator: ThresholdValidator::from_rule(settings.threshold, settings.max_force_newtons),
            max_force_newtons: settings.max_force_newtons,
            tick_period: settings.tick_period(),
            source_timeout: settings.source_timeout(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.session.current_snapshot().await
    }

    pub async fn set_voltage(&self, v1: &str, v2: &str) -> CalibrationResult<f64> {
        self.session.set_voltage(v1, v2).await
    }

    pub async fn is_sampling(&self) -> bool {
        self.sampling.lock().await.is_active()
    }

    /// Idle -> Running. Repeated while Running is a no-op.
    pub async fn start(&self, v1: &str, v2: &str, force_newtons: f64) -> CalibrationResult<Snapshot> {
        // Held for the whole transition so concurrent starts cannot both spawn.
        let mut sampling = self.sampling.lock().await;

        match self.session.state().await {
            SessionState::Running => return Ok(self.session.current_snapshot().await),
            SessionState::Stopped => return Err(CalibrationError::NotReset),
            SessionState::Idle => {}
        }

        let voltage = parse_voltages(v1, v2)?;
        // Written so that a NaN request fails the guard too.
        if !(force_newtons <= self.max_force_newtons) {
            return Err(CalibrationError::ForceLimitExceeded {
                requested: force_newtons,
                max: self.max_force_newtons,
            });
        }

        // A worker that ended on a source failure still holds its handle.
        sampling.stop_sampling().await?;

        let profile = self.session.profile().await;
        let run_id = Uuid::new_v4().to_string();
        self.session
            .begin_run(voltage, force_newtons, run_id.clone(), Utc::now())
            .await;

        info!(
            "starting run {} on {} (v1={}, v2={}, force={} N)",
            run_id, profile.name, v1, v2, force_newtons
        );

        let job = SamplingJob {
            run_id,
            session: self.session.clone(),
            source: self.source.clone(),
            profile,
            validator: self.validator,
            tick_period: self.tick_period,
            pull_timeout: self.source_timeout,
        };
        if let Err(err) = sampling.start_sampling(job) {
            self.session.reset().await;
            return Err(err.into());
        }

        Ok(self.session.current_snapshot().await)
    }

    /// Running -> Stopped, keeping the last snapshot. Waits for the worker.
    pub async fn stop(&self) -> CalibrationResult<Snapshot> {
        let mut sampling = self.sampling.lock().await;
        let joined = sampling.stop_sampling().await;
        self.session.mark_stopped().await;
        joined?;

        let snapshot = self.session.current_snapshot().await;
        info!(
            "run {} stopped after {} ticks",
            snapshot.run_id.as_deref().unwrap_or("-"),
            snapshot.tick_count
        );
        Ok(snapshot)
    }

    /// Any state -> Idle, clearing history, voltages and statuses.
    pub async fn reset(&self) -> CalibrationResult<()> {
        let mut sampling = self.sampling.lock().await;
        let joined = sampling.stop_sampling().await;
        self.session.reset().await;
        if let Err(err) = &joined {
            warn!("sampling worker ended abnormally during reset: {err:#}");
        }
        info!("session reset");
        joined.map_err(Into::into)
    }

    /// Implicit reset, then switch to the named connector profile. Unknown
    /// names are rejected before anything changes.
    pub async fn change_connector_type(&self, name: &str) -> CalibrationResult<ConnectorProfile> {
        let profile = ConnectorProfile::lookup(name)?;

        let mut sampling = self.sampling.lock().await;
        let joined = sampling.stop_sampling().await;
        self.session.set_profile(profile).await;
        info!(
            "connector type changed to {} ({} contacts)",
            profile.name, profile.contact_count
        );
        joined?;
        Ok(*profile)
    }
}
