pub mod simulated;

pub use simulated::SimulatedSource;

use anyhow::Result;

/// Produces raw bench readings. Implemented by the simulator and by real
/// sensor drivers; calls may block, the sampling worker runs them off the
/// async runtime.
pub trait ReadingSource: Send {
    /// One force value (newtons) per contact point, in contact order.
    fn next_force_readings(&mut self, contact_count: usize) -> Result<Vec<f64>>;

    /// Overall resistance across the connector, in ohms.
    fn next_resistance(&mut self) -> Result<f64>;
}

pub type SharedSource = std::sync::Arc<std::sync::Mutex<Box<dyn ReadingSource>>>;

pub fn shared<S: ReadingSource + 'static>(source: S) -> SharedSource {
    std::sync::Arc::new(std::sync::Mutex::new(Box::new(source)))
}
