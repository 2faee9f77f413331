mod ignore;
mod index;

pub use ignore::{IgnoreRules, IGNORE_FILE};
pub use index::{Index, IndexEntry, RefreshSummary};
