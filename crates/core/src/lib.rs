pub mod domain;
pub mod error;
pub mod store;
pub mod types;
