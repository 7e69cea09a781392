pub mod comments;
pub mod health;
pub mod notifications;
pub mod posts;
