use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::{error, info};

use calibench_lib::{
    init_logging, shared, BenchSettings, CalibrationController, SettingsStore, SimulatedSource,
    Snapshot, ThresholdRule,
};

/// Run the connector calibration bench against the simulated sensor and
/// print the live state.
#[derive(Debug, Parser)]
#[command(name = "calibench", version)]
struct Args {
    /// JSON settings file; missing keys fall back to defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Connector profile key, e.g. "Type A".
    #[arg(long)]
    profile: Option<String>,

    #[arg(long)]
    max_force: Option<f64>,

    /// Sampling period in milliseconds.
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Use the band rule with this tolerance instead of the force ceiling.
    #[arg(long)]
    band_tolerance: Option<f64>,

    #[arg(long, default_value = "3")]
    v1: String,

    #[arg(long, default_value = "5")]
    v2: String,

    /// Requested insertion force for the run, in newtons.
    #[arg(long, default_value_t = 5.0)]
    force: f64,

    #[arg(long, default_value_t = 5)]
    duration_secs: u64,

    /// How often the console redraws, independent of the tick period.
    #[arg(long, default_value_t = 1000)]
    render_ms: u64,

    #[arg(long)]
    seed: Option<u64>,

    /// Print each snapshot as JSON.
    #[arg(long)]
    json: bool,
}

impl Args {
    fn settings(&self) -> Result<BenchSettings> {
        let mut settings = match &self.config {
            Some(path) => SettingsStore::new(path.clone())?.settings(),
            None => BenchSettings::default(),
        };
        if let Some(profile) = &self.profile {
            settings.connector_profile = profile.clone();
        }
        if let Some(max_force) = self.max_force {
            settings.max_force_newtons = max_force;
        }
        if let Some(tick_ms) = self.tick_ms {
            settings.tick_period_seconds = tick_ms as f64 / 1000.0;
        }
        if let Some(tolerance_newtons) = self.band_tolerance {
            settings.threshold = ThresholdRule::Band { tolerance_newtons };
        }
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    match run(Args::parse()).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let settings = args.settings()?;
    let source = match args.seed {
        Some(seed) => SimulatedSource::seeded(seed),
        None => SimulatedSource::new(),
    };
    let controller = CalibrationController::new(&settings, shared(source))?;

    info!(
        "bench ready: {} (max {} N, tick {:?})",
        settings.connector_profile,
        settings.max_force_newtons,
        settings.tick_period()
    );

    if let Err(err) = controller.start(&args.v1, &args.v2, args.force).await {
        error!("start rejected: {err}");
        return Ok(ExitCode::FAILURE);
    }

    let mut render = tokio::time::interval(Duration::from_millis(args.render_ms.max(1)));
    let deadline = tokio::time::sleep(Duration::from_secs(args.duration_secs));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            _ = render.tick() => {
                let snapshot = controller.snapshot().await;
                print_snapshot(&snapshot, args.json)?;
                if snapshot.error.is_some() {
                    break;
                }
            }
        }
    }

    let last = controller.stop().await?;
    print_snapshot(&last, args.json)?;

    Ok(match &last.error {
        Some(err) => {
            error!("run ended with a source failure: {err}");
            ExitCode::FAILURE
        }
        None => ExitCode::SUCCESS,
    })
}

fn print_snapshot(snapshot: &Snapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
        return Ok(());
    }

    let avg = snapshot
        .avg_voltage
        .map(|v| format!("{v:.2} V"))
        .unwrap_or_else(|| "-".into());
    let resistance = snapshot
        .latest_resistance()
        .map(|r| format!("{:.2} ohm", r.ohms))
        .unwrap_or_else(|| "-".into());

    println!(
        "[{}] {} t={:.1}s avg={} R={} connector={}",
        snapshot.status_label(),
        snapshot.profile.name,
        snapshot.elapsed_seconds(),
        avg,
        resistance,
        if snapshot.all_contacts_pass() { "PASS" } else { "FAIL" }
    );
    for label in snapshot.contact_labels() {
        println!("  {label}");
    }
    Ok(())
}
