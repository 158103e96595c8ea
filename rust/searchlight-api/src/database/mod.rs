//! Persistence gateway.
//!
//! The service does not own a database. Library and user rows are stored in
//! an external managed datastore reached over PostgREST, or in process
//! memory when none is configured.

pub mod memory;
pub mod postgrest;
pub mod repository;

pub use memory::InMemoryStore;
pub use postgrest::PostgrestClient;
pub use repository::{Database, LibraryRepository, StoreError, UserRepository};
