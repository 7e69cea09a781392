pub mod db;
pub mod memory;
pub mod store;

pub use memory::MemoryStore;
pub use store::{PgStore, Store};
