pub mod upload;

pub use upload::{UploadRecord, UploadStatus};
