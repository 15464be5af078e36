//! Grid layout recomputation engine.
//!
//! The engine owns an [`ItemCollection`](core_items::ItemCollection) and a
//! [`LayoutConfig`]. Every relevant mutation invalidates the current layout:
//! the in-flight background computation (if any) is aborted, a new generation
//! is allocated, and a fresh task computes a [`GridLayout`] from a snapshot of
//! the inputs captured at scheduling time.
//!
//! Completions travel back over a channel and are applied on the publish
//! context, i.e. whichever task owns `&mut LayoutEngine`. A completion is only
//! published when its generation still matches the engine's current one, so a
//! computation that escaped cancellation can never overwrite fresher results no
//! matter how many generations overlap.
//!
//! Consumers observe [`LayoutSnapshot`] values through a `tokio::sync::watch`
//! receiver; each snapshot is replaced as a whole.

mod engine;
mod error;
mod geometry;
mod metrics;

pub use engine::{
    CompletionOutcome, DEFAULT_COLUMNS, DEFAULT_SEED_ITEMS, EngineOptions, EngineState, ItemSeed,
    LayoutEngine, LayoutSnapshot,
};
pub use error::LayoutError;
pub use geometry::{GridLayout, LayoutConfig, LayoutInputs, PartialRow, compute_layout};
pub use metrics::{EngineMetrics, EngineMetricsSnapshot};
