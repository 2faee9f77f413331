mod installer;
mod report;

pub use installer::{InstallSettings, InstallationReconciler, SideSource, DEFAULT_CHECKPOINT_EVERY};
pub use report::{ImportFailure, ImportOutcome, ImportReport, StopReason};
