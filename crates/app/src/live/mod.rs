pub mod client;
pub mod notifier;
pub mod registry;

pub use client::{ClientControl, SubscriptionClient};
pub use notifier::Notifier;
pub use registry::{ClientId, SubscriptionRegistry};
