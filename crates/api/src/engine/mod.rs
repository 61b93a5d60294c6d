//! Background generation machinery: the FIFO queue and its driver, and
//! the retrying client that talks to the upstream provider.

pub mod client;
pub mod queue;

pub use client::{GenerationClient, RetryConfig};
pub use queue::{
    spawn_generation_driver, spawn_queue_retention_sweep, EnqueueReceipt, GenerationJob,
    GenerationQueue, GenerationStatus, QueueSnapshot,
};
