//! Background actors
//!
//! Each actor runs as an independent async task and is driven through a
//! handle that sends commands over an mpsc channel.
//!
//! ## Actor Types
//!
//! - **SnapshotActor**: Periodically saves the in-memory store to its
//!   snapshot file and writes a final snapshot on shutdown
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: Each actor has an mpsc command channel for control messages
//! 2. **Request/Response**: oneshot channels for synchronous queries

pub mod messages;
pub mod snapshot;

pub use snapshot::SnapshotHandle;
