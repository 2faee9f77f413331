mod provider;

pub use provider::{DefaultHashProvider, HashFormat, HashProvider};
