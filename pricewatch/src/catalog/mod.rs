pub mod hook;
pub mod model;
pub mod repository;
pub mod repository_sqlx;

pub use hook::{LogMetadataHook, MetadataHook};
pub use model::{AlertState, TrackedProduct, TrackingSubscription, Transition};
pub use repository::CatalogRepository;
pub use repository_sqlx::SqlxCatalogRepository;
