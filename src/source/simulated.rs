use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::Range;

use super::ReadingSource;

const FORCE_RANGE_NEWTONS: Range<f64> = 5.0..85.0;
const RESISTANCE_RANGE_OHMS: Range<f64> = 10.0..50.0;

/// Random readings in the ranges a healthy bench produces.
pub struct SimulatedSource {
    rng: StdRng,
}

impl SimulatedSource {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible sequence, for demos and tests.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self { rng }
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadingSource for SimulatedSource {
    fn next_force_readings(&mut self, contact_count: usize) -> Result<Vec<f64>> {
        Ok((0..contact_count)
            .map(|_| self.rng.gen_range(FORCE_RANGE_NEWTONS))
            .collect())
    }

    fn next_resistance(&mut self) -> Result<f64> {
        Ok(self.rng.gen_range(RESISTANCE_RANGE_OHMS))
    }
}
