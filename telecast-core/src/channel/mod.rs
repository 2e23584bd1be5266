mod models;
mod store;

pub use models::{
    ArtworkSet, Channel, ChannelOptions, MediaItem, MediaKind, MediaMetadata,
};
pub use store::{ChannelError, ChannelResult, SqliteChannelStore, SqliteChannelStoreBuilder};
