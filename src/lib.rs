//! TxnScope Relay Library
//!
//! This crate polls a block explorer for new token transfers on one address,
//! deduplicates them, asks a local analysis service to comment on the new
//! ones, and hands that commentary to an external publishing program.

pub mod analysis;
pub mod config;
pub mod event;
pub mod fetcher;
pub mod normalizer;
pub mod pipeline;
pub mod publisher;
pub mod scheduler;
pub mod store;

// Re-export commonly used types
pub use analysis::{AnalysisClient, AnalysisResult, Analyzer};
pub use config::WatcherConfig;
pub use event::TransferEvent;
pub use fetcher::{EventSource, ExplorerClient};
pub use normalizer::{normalize, Digest, Locale};
pub use pipeline::{CycleOutcome, CycleState, Pipeline};
pub use publisher::{CommandPublisher, Publish, PublishOutcome};
pub use scheduler::{final_response_line, stop_signal, Scheduler};
pub use store::{Fingerprint, FingerprintStore};
