//! Uplink Worker Library
//!
//! Background post-processing queue: a single worker drains an unbounded
//! FIFO of upload ids and runs each through the processing pipeline.

pub mod queue;

pub use queue::{ProcessingQueue, QueueHandle};
