//! Content-addressed storage of sealed contributions.
//!
//! The pipeline depends only on the `BlobStore` trait; the backend is picked
//! once from configuration and never switched mid-run.

pub mod filesystem;
pub mod ipfs;
pub mod memory;
pub mod traits;

pub use filesystem::FsBlobStore;
pub use ipfs::IpfsBlobStore;
pub use memory::MemoryBlobStore;
pub use traits::{BlobStore, ContentReference, Durability, StoreError, StoreResult};
