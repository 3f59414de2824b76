pub mod controller;
pub mod loop_worker;

pub use controller::SamplingController;
pub use loop_worker::{classify_all, SamplingJob};
