//! Uplink Store Library
//!
//! Record store seam for upload state. The trait is the collaborator
//! interface; `MemoryStore` is the in-process implementation used by the
//! service and its tests.

pub mod memory;
pub mod traits;

pub use memory::MemoryStore;
pub use traits::{ProgressUpdate, StoreError, UploadStore};
