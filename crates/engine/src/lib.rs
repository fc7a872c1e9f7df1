pub mod applier;
pub mod cancel;
pub mod config;
pub mod profile_repair;
pub mod runner;

pub use applier::PatchApplier;
pub use cancel::CancellationFlag;
pub use config::EngineConfig;
pub use profile_repair::{repair_missing_profile, ProfileRepairOutcome};
pub use runner::{Reconciler, RunState};
