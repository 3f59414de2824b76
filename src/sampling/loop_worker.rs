use anyhow::{anyhow, Context, Result};
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::CalibrationError;
use crate::profile::ConnectorProfile;
use crate::session::{ClassifiedContact, ForceReading, ResistanceReading, Session};
use crate::source::SharedSource;
use crate::validation::ThresholdValidator;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Everything one run of the worker needs; moved into the spawned task.
pub struct SamplingJob {
    pub run_id: String,
    pub session: Session,
    pub source: SharedSource,
    pub profile: ConnectorProfile,
    pub validator: ThresholdValidator,
    pub tick_period: Duration,
    pub pull_timeout: Duration,
}

struct TickReadings {
    forces: Vec<ForceReading>,
    ohms: f64,
}

pub async fn sampling_loop(job: SamplingJob, cancel_token: CancellationToken) {
    let start_time = Instant::now();
    let mut ticker = tokio::time::interval(job.tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!(
        "sampling loop started for run {} ({}, {} contacts, every {:?})",
        job.run_id,
        job.profile.name,
        job.profile.contact_count,
        job.tick_period
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("sampling loop shutting down for run {}", job.run_id);
                break;
            }
            _ = ticker.tick() => {
                if cancel_token.is_cancelled() {
                    break;
                }

                let elapsed = start_time.elapsed().as_secs_f64();
                let pull = tokio::time::timeout(
                    job.pull_timeout,
                    pull_readings(&job.source, job.profile.contact_count),
                );
                // A slow source must not hold up stop/reset past this tick.
                let outcome = tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => {
                        log_info!("sampling loop cancelled mid-pull for run {}", job.run_id);
                        break;
                    }
                    outcome = pull => outcome,
                };

                let readings = match outcome {
                    Ok(Ok(readings)) => readings,
                    Ok(Err(err)) => {
                        log_error!("reading source failed for run {}: {err:?}", job.run_id);
                        fail_run(&job, format!("{err:#}")).await;
                        break;
                    }
                    Err(_) => {
                        log_warn!(
                            "reading source timeout (> {:?}) for run {}",
                            job.pull_timeout,
                            job.run_id
                        );
                        fail_run(&job, format!("no reading within {:?}", job.pull_timeout)).await;
                        break;
                    }
                };

                if cancel_token.is_cancelled() {
                    break;
                }

                let statuses = classify_all(&job.validator, &job.profile, &readings.forces);
                let reading = ResistanceReading {
                    ohms: readings.ohms,
                    elapsed_seconds: elapsed,
                };

                if !job.session.publish_tick(&job.run_id, statuses, reading).await {
                    log_warn!("run {} no longer active, discarding tick", job.run_id);
                    break;
                }
                log::debug!(
                    "run {} tick at {:.2}s: {:.2} ohm",
                    job.run_id,
                    elapsed,
                    readings.ohms
                );
            }
        }
    }
}

async fn fail_run(job: &SamplingJob, reason: String) {
    let failure = CalibrationError::SourceFailure(reason);
    job.session.fail(&job.run_id, &failure).await;
}

async fn pull_readings(source: &SharedSource, contact_count: usize) -> Result<TickReadings> {
    let source = source.clone();
    tokio::task::spawn_blocking(move || {
        let mut guard = source
            .lock()
            .map_err(|_| anyhow!("reading source lock poisoned"))?;

        let raw = guard
            .next_force_readings(contact_count)
            .context("force readings unavailable")?;
        if raw.len() != contact_count {
            return Err(anyhow!(
                "expected {contact_count} force readings, source returned {}",
                raw.len()
            ));
        }
        let ohms = guard
            .next_resistance()
            .context("resistance reading unavailable")?;

        let forces = raw
            .into_iter()
            .enumerate()
            .map(|(contact_index, newtons)| ForceReading {
                contact_index,
                newtons,
            })
            .collect();
        Ok(TickReadings { forces, ohms })
    })
    .await
    .context("reading source worker join failed")?
}

pub fn classify_all(
    validator: &ThresholdValidator,
    profile: &ConnectorProfile,
    forces: &[ForceReading],
) -> Vec<ClassifiedContact> {
    forces
        .iter()
        .map(|reading| ClassifiedContact {
            contact_index: reading.contact_index,
            newtons: reading.newtons,
            pass: validator.classify_contact(profile, reading.contact_index, reading.newtons),
        })
        .collect()
}
