mod resolver;

pub use resolver::{resolve, resolve_project, SideDecision, SideResolution, SideSupport, Support};
