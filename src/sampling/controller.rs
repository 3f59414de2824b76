use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::loop_worker::{sampling_loop, SamplingJob};

/// Handle to the background sampling worker. At most one worker exists per
/// controller; `stop_sampling` waits for it to exit.
pub struct SamplingController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl SamplingController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn start_sampling(&mut self, job: SamplingJob) -> Result<()> {
        if self.handle.is_some() {
            bail!("sampling already active");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        info!("spawning sampling worker for run {}", job.run_id);
        let handle = tokio::spawn(sampling_loop(job, token_clone));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop_sampling(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("sampling loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for SamplingController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ConnectorProfile;
    use crate::session::{Session, SessionState, VoltageInput};
    use crate::source::{shared, SimulatedSource};
    use crate::validation::ThresholdValidator;
    use chrono::Utc;
    use std::time::Duration;

    async fn running_job(session: &Session) -> SamplingJob {
        let profile = ConnectorProfile::default_profile();
        session
            .begin_run(VoltageInput::default(), 1.0, "run".into(), Utc::now())
            .await;
        SamplingJob {
            run_id: "run".into(),
            session: session.clone(),
            source: shared(SimulatedSource::seeded(9)),
            profile: *profile,
            validator: ThresholdValidator::Ceiling { max_newtons: 50.0 },
            tick_period: Duration::from_millis(10),
            pull_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn refuses_a_second_worker() {
        let session = Session::new(ConnectorProfile::default_profile());
        let mut controller = SamplingController::new();

        controller.start_sampling(running_job(&session).await).unwrap();
        assert!(controller.is_active());
        assert!(controller
            .start_sampling(running_job(&session).await)
            .is_err());

        controller.stop_sampling().await.unwrap();
        assert!(!controller.is_active());
        assert_eq!(session.state().await, SessionState::Running);
    }

    #[tokio::test]
    async fn stop_without_worker_is_ok() {
        let mut controller = SamplingController::default();
        controller.stop_sampling().await.unwrap();
        assert!(!controller.is_active());
    }
}
