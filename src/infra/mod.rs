//! Infrastructure adapters for the persistent store.

pub mod store;

pub use store::InMemoryStore;
#[cfg(feature = "postgres")]
pub use store::PostgresStore;
