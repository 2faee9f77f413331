mod engine;

pub use engine::{DiffEngine, DiffReport, LocalMods, ModInfo, SourceTally};
