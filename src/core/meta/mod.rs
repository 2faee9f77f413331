mod modify;
mod record;
mod slug;

pub use modify::RecordChanges;
pub use record::{
    normalize_client_platforms, normalize_side, validate_client_platforms, validate_side,
    CurseForgeUpdate, Download, GitHubUpdate, MetaRecord, ModOption, ModrinthUpdate, Side,
    UpdateSource, META_EXTENSION, VALID_CLIENT_PLATFORMS,
};
pub use slug::slugify_name;
