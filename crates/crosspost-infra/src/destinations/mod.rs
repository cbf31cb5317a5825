//! Destination adapters: platform clients and connection directories.

mod directory;
mod http;
mod router;

pub use directory::InMemoryDestinationDirectory;
pub use http::{HttpDestinationClient, HttpDestinationConfig};
pub use router::PlatformRouter;

#[cfg(feature = "postgres")]
pub use directory::PostgresDestinationDirectory;
