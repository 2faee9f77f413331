mod pack;

pub use pack::{Pack, PackIndexRef, PackOptions, DEFAULT_DATAPACK_FOLDER};
