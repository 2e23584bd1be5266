mod codec;
mod error;
mod models;
mod resolver;
mod session;

pub use codec::{assess_compatibility, CodecVerdict};
pub use error::{StreamError, StreamResult};
pub use models::{
    AuthToken, DeliveryMode, Negotiation, PlanOptions, SessionContext, StreamPlan,
    TechnicalMetadata, TokenClass,
};
pub use resolver::PlanResolver;
pub use session::{
    HttpMetadataClient, HttpTimelineReporter, MetadataClient, PlaybackState, SessionProvider,
    TimelineReporter, TimelineUpdate,
};
