//! Layout engine state machine.
//!
//! States are `Idle` and `Computing { generation }`. A mutation arriving while
//! computing aborts the in-flight task and schedules a successor; the two may
//! briefly overlap because `JoinHandle::abort` is advisory once a task has
//! started. Overlap is harmless: completions are applied on the publish
//! context and anything whose generation is not the current one is dropped.

use std::sync::Arc;

use core_items::{Item, ItemCollection, ViewState};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::{
    EngineMetrics, EngineMetricsSnapshot, GridLayout, LayoutConfig, LayoutError, LayoutInputs,
    compute_layout,
};

pub const DEFAULT_COLUMNS: usize = 3;
pub const DEFAULT_SEED_ITEMS: usize = 8;

/// Initial contents of the engine's collection.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemSeed {
    /// `n` items labelled `"0"..n-1`.
    Count(usize),
    Items(Vec<Item>),
}

impl Default for ItemSeed {
    fn default() -> Self {
        ItemSeed::Count(DEFAULT_SEED_ITEMS)
    }
}

/// Construction parameters. Container width and spacing are required; the
/// rest default to three columns and eight seeded items.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub container_width: f64,
    pub spacing: f64,
    pub columns: usize,
    pub seed: ItemSeed,
}

impl EngineOptions {
    pub fn new(container_width: f64, spacing: f64) -> Self {
        Self {
            container_width,
            spacing,
            columns: DEFAULT_COLUMNS,
            seed: ItemSeed::default(),
        }
    }

    pub fn columns(mut self, columns: usize) -> Self {
        self.columns = columns;
        self
    }

    pub fn seed_count(mut self, count: usize) -> Self {
        self.seed = ItemSeed::Count(count);
        self
    }

    pub fn items(mut self, items: impl IntoIterator<Item = Item>) -> Self {
        self.seed = ItemSeed::Items(items.into_iter().collect());
        self
    }
}

/// Published value: a layout plus the generation that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutSnapshot {
    pub generation: u64,
    pub layout: GridLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Computing { generation: u64 },
}

/// What applying one completion did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompletionOutcome {
    Published(LayoutSnapshot),
    /// Current generation, but the collection was empty; nothing published.
    Empty { generation: u64 },
    /// Superseded generation; discarded.
    Stale { generation: u64 },
}

#[derive(Debug)]
struct Completion {
    generation: u64,
    inputs: LayoutInputs,
    layout: Option<GridLayout>,
}

#[derive(Debug)]
struct InFlight {
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct LayoutEngine {
    items: ItemCollection,
    config: LayoutConfig,
    generation: u64,
    in_flight: Option<InFlight>,
    runtime: Handle,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    published: watch::Sender<LayoutSnapshot>,
    metrics: Arc<EngineMetrics>,
}

impl LayoutEngine {
    /// Build an engine on the ambient tokio runtime.
    pub fn new(options: EngineOptions) -> Result<Self, LayoutError> {
        let runtime = Handle::try_current().map_err(|_| LayoutError::NoRuntime)?;
        Self::with_runtime(options, runtime)
    }

    /// Build an engine whose background computations run on `runtime`.
    ///
    /// Seeding and the first computation happen synchronously here, so the
    /// returned engine is `Idle` with a valid published layout and there is
    /// no window in which a half-built engine reacts to mutations.
    pub fn with_runtime(options: EngineOptions, runtime: Handle) -> Result<Self, LayoutError> {
        let config = LayoutConfig::new(options.container_width, options.spacing, options.columns)?;
        let items = match options.seed {
            ItemSeed::Count(n) => ItemCollection::seeded(n),
            ItemSeed::Items(items) => items.into_iter().collect(),
        };
        let inputs = LayoutInputs::capture(&config, items.len());
        let layout =
            compute_layout(&inputs).unwrap_or_else(|| GridLayout::empty(config.cell_width()));
        let (published, _) = watch::channel(LayoutSnapshot {
            generation: 0,
            layout,
        });
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        info!(
            target: "layout.engine",
            item_count = items.len(),
            columns = config.columns(),
            container_width = config.container_width(),
            spacing = config.spacing(),
            row_count = layout.row_count,
            "engine_ready"
        );
        Ok(Self {
            items,
            config,
            generation: 0,
            in_flight: None,
            runtime,
            completion_tx,
            completion_rx,
            published,
            metrics: Arc::new(EngineMetrics::default()),
        })
    }

    // ---------------------------------------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------------------------------------

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn set_container_width(&mut self, width: f64) -> Result<(), LayoutError> {
        self.reconfigure("container_width", |cfg| cfg.set_container_width(width))
    }

    pub fn set_spacing(&mut self, spacing: f64) -> Result<(), LayoutError> {
        self.reconfigure("spacing", |cfg| cfg.set_spacing(spacing))
    }

    /// Zero columns is rejected; the previous count and the last published
    /// layout stay in place.
    pub fn set_columns(&mut self, columns: usize) -> Result<(), LayoutError> {
        self.reconfigure("columns", |cfg| cfg.set_columns(columns))
    }

    fn reconfigure(
        &mut self,
        field: &'static str,
        apply: impl FnOnce(&mut LayoutConfig) -> Result<(), LayoutError>,
    ) -> Result<(), LayoutError> {
        if let Err(err) = apply(&mut self.config) {
            self.metrics.incr_rejected_config();
            warn!(target: "layout.engine", field, %err, "config_rejected");
            return Err(err);
        }
        self.invalidate(field);
        Ok(())
    }

    // ---------------------------------------------------------------------------------------------
    // Items
    // ---------------------------------------------------------------------------------------------

    pub fn items(&self) -> &ItemCollection {
        &self.items
    }

    /// Insert before `at`, appending when `at` is out of range. Returns the
    /// index the item landed on.
    pub fn add_item(&mut self, item: Item, at: usize) -> usize {
        let landed = self.items.insert(item, at);
        self.invalidate("item_added");
        landed
    }

    /// Remove `index`, or the last item when out of range. Recomputes only
    /// when something was removed.
    pub fn remove_item(&mut self, index: usize) -> Option<Item> {
        let removed = self.items.remove_at(index);
        if removed.is_some() {
            self.invalidate("item_removed");
        }
        removed
    }

    /// Bounds-checked counterpart of [`add_item`](Self::add_item).
    pub fn try_add_item(&mut self, item: Item, at: usize) -> Result<usize, LayoutError> {
        let landed = self.items.try_insert(item, at)?;
        self.invalidate("item_added");
        Ok(landed)
    }

    /// Bounds-checked counterpart of [`remove_item`](Self::remove_item).
    pub fn try_remove_item(&mut self, index: usize) -> Result<Item, LayoutError> {
        let removed = self.items.try_remove_at(index)?;
        self.invalidate("item_removed");
        Ok(removed)
    }

    /// Item at `(row, column)` under the current column count.
    pub fn get_item(&self, row: usize, column: usize) -> Option<&Item> {
        self.items.get(row, column, self.config.columns())
    }

    /// View state changes never touch geometry, so no recomputation.
    pub fn set_item_state(&mut self, index: usize, state: ViewState) -> bool {
        match self.items.get_index_mut(index) {
            Some(item) => {
                item.view_state = state;
                true
            }
            None => false,
        }
    }

    pub fn toggle_item_state(&mut self, index: usize) -> Option<ViewState> {
        let state = self.items.get_index_mut(index)?.toggle_state();
        trace!(target: "layout.items", index, state = state.as_str(), "view_state_toggled");
        Some(state)
    }

    // ---------------------------------------------------------------------------------------------
    // Published state
    // ---------------------------------------------------------------------------------------------

    pub fn snapshot(&self) -> LayoutSnapshot {
        *self.published.borrow()
    }

    pub fn layout(&self) -> GridLayout {
        self.snapshot().layout
    }

    pub fn subscribe(&self) -> watch::Receiver<LayoutSnapshot> {
        self.published.subscribe()
    }

    pub fn state(&self) -> EngineState {
        match &self.in_flight {
            Some(f) => EngineState::Computing {
                generation: f.generation,
            },
            None => EngineState::Idle,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn metrics_snapshot(&self) -> EngineMetricsSnapshot {
        self.metrics.snapshot()
    }

    // ---------------------------------------------------------------------------------------------
    // Scheduling
    // ---------------------------------------------------------------------------------------------

    /// Schedule a recomputation with unchanged inputs.
    pub fn recompute(&mut self) {
        self.invalidate("explicit");
    }

    fn invalidate(&mut self, reason: &'static str) {
        if let Some(prev) = self.in_flight.take() {
            prev.handle.abort();
            self.metrics.incr_cancelled();
            debug!(target: "layout.engine", generation = prev.generation, reason, "computation_cancelled");
        }

        self.generation += 1;
        let generation = self.generation;
        let inputs = LayoutInputs::capture(&self.config, self.items.len());
        let tx = self.completion_tx.clone();
        let metrics = Arc::clone(&self.metrics);
        let handle = self.runtime.spawn(async move {
            let layout = compute_layout(&inputs);
            metrics.incr_computed();
            // Send only fails once the engine (and its receiver) is gone.
            let _ = tx.send(Completion {
                generation,
                inputs,
                layout,
            });
        });

        self.metrics.incr_scheduled();
        debug!(
            target: "layout.engine",
            generation,
            reason,
            item_count = inputs.item_count,
            columns = inputs.columns,
            "computation_scheduled"
        );
        self.in_flight = Some(InFlight { generation, handle });
    }

    fn apply_completion(&mut self, completion: Completion) -> CompletionOutcome {
        let Completion {
            generation,
            inputs,
            layout,
        } = completion;

        if generation != self.generation {
            self.metrics.incr_discarded_stale();
            trace!(target: "layout.engine", generation, current = self.generation, "completion_stale");
            return CompletionOutcome::Stale { generation };
        }

        self.in_flight = None;
        match layout {
            None => {
                self.metrics.incr_skipped_empty();
                debug!(target: "layout.engine", generation, "completion_empty_collection");
                CompletionOutcome::Empty { generation }
            }
            Some(layout) => {
                let snapshot = LayoutSnapshot { generation, layout };
                self.published.send_replace(snapshot);
                self.metrics.incr_published();
                debug!(
                    target: "layout.engine",
                    generation,
                    item_count = inputs.item_count,
                    row_count = layout.row_count,
                    partial_row = ?layout.partial_row,
                    cell_width = layout.cell_width,
                    "layout_published"
                );
                CompletionOutcome::Published(snapshot)
            }
        }
    }

    /// Apply every completion that has already arrived, without waiting.
    pub fn drain_completions(&mut self) -> Vec<CompletionOutcome> {
        let mut out = Vec::new();
        while let Ok(completion) = self.completion_rx.try_recv() {
            out.push(self.apply_completion(completion));
        }
        out
    }

    /// Wait for the next completion and apply it. Cancel safe, so it can sit
    /// in a `tokio::select!` next to other event sources. Never resolves while
    /// nothing has been scheduled.
    pub async fn process_completion(&mut self) -> Option<CompletionOutcome> {
        let completion = self.completion_rx.recv().await?;
        Some(self.apply_completion(completion))
    }

    /// Apply completions until the engine is idle and return the published
    /// snapshot.
    pub async fn settle(&mut self) -> LayoutSnapshot {
        while self.in_flight.is_some() {
            if self.process_completion().await.is_none() {
                break;
            }
        }
        self.snapshot()
    }
}

impl Drop for LayoutEngine {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.handle.abort();
        }
    }
}

impl std::fmt::Debug for LayoutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutEngine")
            .field("item_count", &self.items.len())
            .field("config", &self.config)
            .field("generation", &self.generation)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for LockedWriter<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime")
    }

    fn stale_completion(generation: u64) -> Completion {
        let inputs = LayoutInputs {
            item_count: 5,
            columns: 5,
            container_width: 100.0,
            spacing: 0.0,
        };
        Completion {
            generation,
            inputs,
            layout: compute_layout(&inputs),
        }
    }

    #[test]
    fn stale_completion_never_publishes() {
        let rt = runtime();
        let mut engine =
            LayoutEngine::with_runtime(EngineOptions::new(310.0, 10.0), rt.handle().clone())
                .unwrap();
        let before = engine.snapshot();
        // Three generations in flight; only the third may publish.
        engine.recompute();
        engine.recompute();
        engine.recompute();
        assert_eq!(engine.generation(), 3);

        for generation in [1, 2] {
            let outcome = engine.apply_completion(stale_completion(generation));
            assert_eq!(outcome, CompletionOutcome::Stale { generation });
        }
        assert_eq!(engine.snapshot(), before);
        assert_eq!(engine.state(), EngineState::Computing { generation: 3 });
        assert_eq!(engine.metrics_snapshot().discarded_stale, 2);
        assert_eq!(engine.metrics_snapshot().published, 0);
    }

    #[test]
    fn stale_completion_after_publish_is_ignored() {
        let rt = runtime();
        let mut engine =
            LayoutEngine::with_runtime(EngineOptions::new(310.0, 10.0), rt.handle().clone())
                .unwrap();
        engine.set_columns(4).unwrap();
        engine.set_columns(2).unwrap();
        let published = rt.block_on(engine.settle());
        assert_eq!(published.generation, 2);
        assert_eq!(published.layout.row_count, 4);

        // A generation-1 task that escaped abort reports late.
        let outcome = engine.apply_completion(stale_completion(1));
        assert_eq!(outcome, CompletionOutcome::Stale { generation: 1 });
        assert_eq!(engine.snapshot(), published);
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn rejected_columns_log_under_engine_target() {
        let rt = runtime();
        let mut engine =
            LayoutEngine::with_runtime(EngineOptions::new(310.0, 10.0), rt.handle().clone())
                .unwrap();
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::WARN)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(BufferWriter {
                inner: buffer.clone(),
            })
            .finish();

        let result = with_default(subscriber, || engine.set_columns(0));
        assert_eq!(result, Err(LayoutError::InvalidColumns(0)));

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("WARN layout.engine:"));
        assert!(log_output.contains("config_rejected"));
        assert_eq!(engine.metrics_snapshot().rejected_config, 1);
    }

    #[test]
    fn construction_without_runtime_fails() {
        let err = LayoutEngine::new(EngineOptions::new(310.0, 10.0)).unwrap_err();
        assert_eq!(err, LayoutError::NoRuntime);
    }

    #[test]
    fn item_state_changes_do_not_schedule() {
        let rt = runtime();
        let mut engine =
            LayoutEngine::with_runtime(EngineOptions::new(310.0, 10.0), rt.handle().clone())
                .unwrap();
        assert_eq!(engine.toggle_item_state(0), Some(ViewState::ContentShowing));
        assert!(engine.set_item_state(1, ViewState::NoContent));
        assert!(!engine.set_item_state(99, ViewState::NoContent));
        assert_eq!(engine.toggle_item_state(99), None);
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.metrics_snapshot().scheduled, 0);
    }
}
