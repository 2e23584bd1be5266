pub mod channel;
pub mod config;
pub mod error;
pub mod filter;
pub mod library;
pub mod recovery;
pub mod schedule;
pub mod sqlite;
pub mod stream;

pub use channel::{
    ArtworkSet, Channel, ChannelError, ChannelOptions, ChannelResult, MediaItem, MediaKind,
    MediaMetadata, SqliteChannelStore, SqliteChannelStoreBuilder,
};
pub use config::{
    load_telecast_config, LibrarySection, NetworkSection, RecoverySection, StreamSection,
    TelecastConfig,
};
pub use error::{ConfigError, Result};
pub use filter::{
    matches_rule, FilterField, FilterGroup, FilterOperator, FilterRule, FilterValue, MatchMode,
    MediaAttributes, RelativeDatePreset, SpanUnit, ValueKind,
};
pub use library::{
    CatalogError, CatalogItem, CatalogResult, LibraryOrchestrator, MediaFetcher, SnapshotCache,
    SnapshotKey, SortDescriptor, SortKey, SortOrder,
};
pub use recovery::{
    AdaptiveState, PlaybackHandle, RecoveryDecision, RecoveryError, RecoverySupervisor,
    ReplanRequest, TelemetryEvent,
};
pub use schedule::{next_up, playback_position, PlaybackPosition};
pub use stream::{
    AuthToken, DeliveryMode, HttpMetadataClient, HttpTimelineReporter, MetadataClient,
    PlanOptions, PlanResolver, PlaybackState, SessionContext, SessionProvider, StreamError,
    StreamPlan, StreamResult, TechnicalMetadata, TimelineReporter, TimelineUpdate, TokenClass,
};
