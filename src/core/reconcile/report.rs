use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    /// Manifest path of the artifact.
    pub path: String,
    pub reason: String,
}

/// Counters for one import batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Manifest files the catalog resolved to a version.
    pub total: usize,
    pub installed: usize,
    /// Already present in the pack, or earlier in the same batch.
    pub skipped: usize,
    /// Supported on neither side according to the manifest.
    pub unsupported: usize,
    /// Manifest hashes the catalog did not recognize.
    pub unmatched: usize,
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Everything resolved that was neither installed nor deliberately
    /// passed over, including items never reached after an interruption.
    pub fn failed(&self) -> usize {
        self.total
            .saturating_sub(self.installed + self.skipped + self.unsupported)
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} installed, {} skipped (already installed), {} failed",
            self.installed,
            self.skipped,
            self.failed()
        )?;
        if self.unsupported > 0 {
            write!(f, ", {} unsupported", self.unsupported)?;
        }
        Ok(())
    }
}

/// Why the batch stopped. Every reason goes through the same checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    Interrupted,
    Fault(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub report: ImportReport,
    pub stop: StopReason,
}
