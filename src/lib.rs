//! Connector calibration bench core.
//!
//! A [`CalibrationController`] drives one [`Session`]: `start` spawns a
//! sampling worker that pulls force and resistance readings from a
//! [`ReadingSource`], classifies each contact and publishes a fresh
//! [`Snapshot`] per tick. Consumers poll `Session::current_snapshot` at their
//! own cadence.

pub mod error;
pub mod lifecycle;
pub mod profile;
pub mod sampling;
pub mod session;
pub mod settings;
pub mod source;
pub mod utils;
pub mod validation;

pub use error::{CalibrationError, CalibrationResult};
pub use lifecycle::CalibrationController;
pub use profile::ConnectorProfile;
pub use session::{
    ClassifiedContact, ForceReading, ResistanceReading, Session, SessionState, Snapshot,
    VoltageInput,
};
pub use settings::{BenchSettings, SettingsStore};
pub use source::{shared, ReadingSource, SharedSource, SimulatedSource};
pub use utils::logging::init_logging;
pub use validation::{classify, ThresholdRule, ThresholdValidator};
