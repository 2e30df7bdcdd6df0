//! gy-core: shared error type, worker settings, and the progress-event bus.
//!
//! This crate is the foundational dependency for gy-db and the graveyard
//! binary, providing a unified error type, the persisted worker settings
//! snapshot, and the broadcast channel that carries progress events to
//! UI subscribers.

pub mod error;
pub mod events;
pub mod settings;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use events::{EventBus, ProgressEvent, WorkerPhase};
pub use settings::WorkerSettings;
