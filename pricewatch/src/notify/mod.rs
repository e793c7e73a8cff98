pub mod client;
pub mod dispatcher;
pub mod errors;
pub mod message;
pub mod provider;

pub use client::HttpPushProvider;
pub use dispatcher::{DispatchReport, NotificationDispatcher};
pub use errors::PushError;
pub use message::PushMessage;
pub use provider::{PushProvider, SendOutcome};
