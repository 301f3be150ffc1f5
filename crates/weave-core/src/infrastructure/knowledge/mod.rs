//! Knowledge graph store implementations

mod memory;
mod repository;

pub use memory::InMemoryGraphStore;
pub use repository::SqliteGraphStore;
