//! Command implementations for gtifilt.

pub mod apply;
pub mod batch;
pub mod energy;
pub mod simulate;

pub use apply::{ApplyGtiCommand, ApplyReport};
pub use batch::{read_manifest, BatchCommand, BatchJob, BatchSummary};
pub use energy::EnergyCommand;
pub use simulate::{SimulateCommand, SimulateConfig, SimulateStats};
