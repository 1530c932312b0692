//! Simulation de lectures à codes-barres

pub mod error_model;
pub mod metrics;
pub mod simulator;

pub use error_model::{ErrorModel, QualityRange};
pub use metrics::AssignmentMetrics;
pub use simulator::{parse_truth, ReadSimulator, SimulatedRead, SimulationConfig};
