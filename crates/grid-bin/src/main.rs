//! gridview entrypoint.
use anyhow::{Context, Result};
use clap::Parser;
use core_config::{Config, LayoutOverrides, load_from};
use core_events::{CommandSourceRegistry, GridCommand, ScriptedCommandSource, command_telemetry};
use core_items::Item;
use core_layout::{CompletionOutcome, EngineOptions, LayoutEngine};
use rand::Rng;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;

mod render;
mod stdin_source;

use stdin_source::StdinCommandSource;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "gridview", version, about = "Grid layout demo")]
struct Args {
    /// Optional configuration file path (overrides discovery of `gridview.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Container width in layout points.
    #[arg(long)]
    pub width: Option<f64>,
    /// Horizontal spacing between cells.
    #[arg(long)]
    pub spacing: Option<f64>,
    /// Cells per full row.
    #[arg(long)]
    pub columns: Option<usize>,
    /// Number of items seeded at startup.
    #[arg(long)]
    pub seed: Option<usize>,
    /// Read commands from this file instead of stdin (one per line, `#` comments).
    #[arg(long)]
    pub script: Option<PathBuf>,
    /// Delay between scripted commands, in milliseconds.
    #[arg(long = "pace-ms")]
    pub pace_ms: Option<u64>,
}

impl Args {
    fn overrides(&self) -> LayoutOverrides {
        LayoutOverrides {
            container_width: self.width,
            spacing: self.spacing,
            columns: self.columns,
            seed_items: self.seed,
        }
    }
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

struct RuntimeContext {
    args: Args,
    config: Config,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn run(&mut self) -> Result<RuntimeContext> {
        self.configure_logging()?;
        Self::install_panic_hook();
        info!(target: "runtime", "startup");

        let args = Args::parse();
        let config_override = args.config.is_some();
        let mut config = load_from(args.config.clone())?;
        let overridden = config.apply_overrides(&args.overrides());

        let path_str = config.path.as_ref().map(|p| p.to_string_lossy().to_string());
        info!(
            target: "runtime.startup",
            path = path_str.as_deref(),
            config_override,
            overridden,
            scripted = args.script.is_some(),
            "bootstrap_complete"
        );
        Ok(RuntimeContext { args, config })
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("gridview.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "gridview.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => {
                self.log_guard = Some(guard);
            }
            Err(_err) => {
                // Global tracing subscriber already installed; drop guard so writer shuts down.
            }
        }

        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

fn engine_options(config: &Config) -> EngineOptions {
    let layout = &config.file.layout;
    EngineOptions::new(layout.container_width, layout.spacing)
        .columns(layout.columns)
        .seed_count(layout.seed_items)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownReason {
    Quit,
    SourcesExhausted,
}

impl ShutdownReason {
    fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::Quit => "quit",
            ShutdownReason::SourcesExhausted => "sources_exhausted",
        }
    }
}

enum LoopControl {
    Continue,
    Break { reason: ShutdownReason },
}

/// Owns the engine and is its publish context: commands are applied and
/// completions published on this one task.
struct GridRuntime<W: Write> {
    engine: LayoutEngine,
    rx: mpsc::Receiver<GridCommand>,
    source_handles: Vec<JoinHandle<()>>,
    out: W,
    last_rendered: Option<u64>,
}

impl<W: Write> GridRuntime<W> {
    fn new(
        engine: LayoutEngine,
        rx: mpsc::Receiver<GridCommand>,
        source_handles: Vec<JoinHandle<()>>,
        out: W,
    ) -> Self {
        Self {
            engine,
            rx,
            source_handles,
            out,
            last_rendered: None,
        }
    }

    async fn run(&mut self) -> Result<ShutdownReason> {
        self.render()?;

        let loop_span = tracing::debug_span!(target: "runtime", "event_loop");
        let _enter_loop = loop_span.enter();

        let reason = loop {
            tokio::select! {
                maybe_cmd = self.rx.recv() => {
                    let Some(cmd) = maybe_cmd else {
                        break ShutdownReason::SourcesExhausted;
                    };
                    match self.handle_command(cmd)? {
                        LoopControl::Continue => {}
                        LoopControl::Break { reason } => break reason,
                    }
                }
                Some(outcome) = self.engine.process_completion() => {
                    self.handle_completion(outcome)?;
                }
            }
        };

        // Let the last scheduled computation land so the final frame is current.
        let snapshot = self.engine.settle().await;
        if self.last_rendered != Some(snapshot.generation) {
            self.render()?;
        }

        self.rx.close();
        self.finalize_shutdown(reason).await;
        Ok(reason)
    }

    fn handle_command(&mut self, cmd: GridCommand) -> Result<LoopControl> {
        trace!(target: "runtime.commands", %cmd, "command_received");
        match cmd {
            GridCommand::Add { at } => {
                let label = self.engine.items().len().to_string();
                let landed = self.engine.add_item(Item::new(label), at);
                debug!(target: "runtime.commands", requested = at, landed, "item_added");
            }
            GridCommand::Remove { at } => match self.engine.remove_item(at) {
                Some(item) => {
                    debug!(target: "runtime.commands", requested = at, id = item.id.as_str(), "item_removed")
                }
                None => debug!(target: "runtime.commands", "remove_on_empty"),
            },
            GridCommand::SetColumns(columns) => {
                let result = self.engine.set_columns(columns);
                self.report(result)?;
            }
            GridCommand::SetWidth(width) => {
                let result = self.engine.set_container_width(width);
                self.report(result)?;
            }
            GridCommand::SetSpacing(spacing) => {
                let result = self.engine.set_spacing(spacing);
                self.report(result)?;
            }
            GridCommand::Toggle { index } => {
                let len = self.engine.items().len();
                let Some(index) = index.or_else(|| {
                    (len > 0).then(|| rand::thread_rng().gen_range(0..len))
                }) else {
                    writeln!(self.out, "! no items to toggle")?;
                    return Ok(LoopControl::Continue);
                };
                // View state is not geometry: redraw now, nothing to recompute.
                if self.engine.toggle_item_state(index).is_some() {
                    self.render()?;
                } else {
                    writeln!(self.out, "! no item at index {index}")?;
                }
            }
            GridCommand::Render => self.render()?,
            GridCommand::Quit => {
                return Ok(LoopControl::Break {
                    reason: ShutdownReason::Quit,
                });
            }
        }
        Ok(LoopControl::Continue)
    }

    /// Configuration errors are surfaced to the user; the grid keeps showing
    /// the last good layout.
    fn report(&mut self, result: Result<(), core_layout::LayoutError>) -> Result<()> {
        if let Err(e) = result {
            writeln!(self.out, "! {e}")?;
        }
        Ok(())
    }

    fn handle_completion(&mut self, outcome: CompletionOutcome) -> Result<()> {
        match outcome {
            CompletionOutcome::Published(_) => self.render()?,
            CompletionOutcome::Empty { generation } => {
                trace!(target: "runtime", generation, "empty_collection_layout_kept")
            }
            CompletionOutcome::Stale { generation } => {
                trace!(target: "runtime", generation, "stale_completion_dropped")
            }
        }
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        render::render_grid(&mut self.out, &self.engine)?;
        self.out.flush()?;
        self.last_rendered = Some(self.engine.snapshot().generation);
        Ok(())
    }

    async fn finalize_shutdown(&mut self, reason: ShutdownReason) {
        info!(target: "runtime.shutdown", reason = reason.as_str(), "begin");
        while let Some(mut handle) = self.source_handles.pop() {
            match tokio::time::timeout(Duration::from_millis(200), &mut handle).await {
                Ok(Ok(_)) => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "command_source_stopped"
                ),
                Ok(Err(err)) if err.is_cancelled() => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "command_source_cancelled"
                ),
                Ok(Err(err)) => error!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    ?err,
                    "command_source_error"
                ),
                Err(_) => {
                    warn!(
                        target: "runtime.shutdown",
                        reason = reason.as_str(),
                        "command_source_timeout"
                    );
                    handle.abort();
                }
            }
        }
        let metrics = self.engine.metrics_snapshot();
        let commands = command_telemetry();
        info!(
            target: "runtime.shutdown",
            reason = reason.as_str(),
            scheduled = metrics.scheduled,
            cancelled = metrics.cancelled,
            published = metrics.published,
            discarded_stale = metrics.discarded_stale,
            commands_sent = commands.sent,
            command_send_failures = commands.send_failures,
            command_parse_failures = commands.parse_failures,
            "complete"
        );
    }
}

fn register_sources(args: &Args, registry: &mut CommandSourceRegistry) -> Result<()> {
    match &args.script {
        Some(path) => {
            let script = std::fs::read_to_string(path)
                .with_context(|| format!("reading script {}", path.display()))?;
            let mut source = ScriptedCommandSource::from_script(&script).map_err(|(line, e)| {
                anyhow::anyhow!("{}:{line}: {e}", path.display())
            })?;
            if let Some(ms) = args.pace_ms {
                source = source.paced(Duration::from_millis(ms));
            }
            registry.register(source);
        }
        None => registry.register(StdinCommandSource),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut startup = AppStartup::new();
    let RuntimeContext { args, config } = startup.run()?;

    let engine = LayoutEngine::new(engine_options(&config)).context("invalid layout configuration")?;

    let (tx, rx) = mpsc::channel::<GridCommand>(config.command_channel_capacity());
    let mut registry = CommandSourceRegistry::new();
    register_sources(&args, &mut registry)?;
    debug!(target: "runtime.commands", sources = registry.len(), "command_sources_registered");
    let source_handles = registry.spawn_all(&tx);
    // Sources hold the only senders; the loop ends when they are all done.
    drop(tx);

    let mut runtime = GridRuntime::new(engine, rx, source_handles, std::io::stdout());
    runtime.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::COMMAND_CHANNEL_CAP;
    use core_items::ViewState;

    async fn run_script(options: EngineOptions, script: &str) -> (String, LayoutEngine) {
        let engine = LayoutEngine::new(options).unwrap();
        let (tx, rx) = mpsc::channel::<GridCommand>(COMMAND_CHANNEL_CAP);
        let mut registry = CommandSourceRegistry::new();
        registry.register(ScriptedCommandSource::from_script(script).unwrap());
        let handles = registry.spawn_all(&tx);
        drop(tx);

        let mut runtime = GridRuntime::new(engine, rx, handles, Vec::new());
        runtime.run().await.unwrap();
        let GridRuntime { engine, out, .. } = runtime;
        (String::from_utf8(out).unwrap(), engine)
    }

    fn demo() -> EngineOptions {
        EngineOptions::new(310.0, 10.0)
    }

    #[tokio::test]
    async fn removing_two_items_ends_on_full_rows() {
        let (out, engine) = run_script(demo(), "remove 0\nremove 0\nquit\n").await;
        assert!(out.starts_with("gen 0 | rows 3 | cell 96.67 | partial row 2 x2"));
        let last_header = out.lines().filter(|l| l.starts_with("gen ")).last().unwrap();
        assert_eq!(last_header, "gen 2 | rows 2 | cell 96.67 | partial none");
        assert_eq!(engine.items().len(), 6);
    }

    #[tokio::test]
    async fn added_items_are_labelled_by_count() {
        let (_, engine) = run_script(demo(), "add 0\nadd 999\n").await;
        let ids: Vec<&str> = engine.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids.first(), Some(&"8"));
        assert_eq!(ids.last(), Some(&"9"));
        assert_eq!(engine.layout().row_count, 4);
    }

    #[tokio::test]
    async fn zero_columns_is_reported_and_layout_kept() {
        let (out, engine) = run_script(demo(), "columns 0\nrender\nquit\n").await;
        assert!(out.contains("! column count must be at least 1 (got 0)"));
        assert_eq!(engine.config().columns(), 3);
        assert_eq!(engine.layout().row_count, 3);
        assert_eq!(engine.snapshot().generation, 0);
    }

    #[tokio::test]
    async fn toggle_redraws_without_recompute() {
        let (out, engine) = run_script(demo(), "toggle 4\nquit\n").await;
        assert!(out.contains("4+"));
        assert_eq!(engine.metrics_snapshot().scheduled, 0);
    }

    #[tokio::test]
    async fn bare_toggle_flips_some_item() {
        let (out, engine) = run_script(demo().seed_count(1), "toggle\nquit\n").await;
        assert!(out.contains("0+"));
        assert_eq!(
            engine.items().get_index(0).map(|i| i.view_state),
            Some(ViewState::ContentShowing)
        );

        let (_, engine) = run_script(demo(), "flip\nquit\n").await;
        let flipped = engine
            .items()
            .iter()
            .filter(|i| i.view_state != ViewState::Loading)
            .count();
        assert_eq!(flipped, 1);
        assert_eq!(engine.metrics_snapshot().scheduled, 0);
    }

    #[tokio::test]
    async fn bare_toggle_on_empty_grid_is_reported() {
        let (out, _) = run_script(demo().seed_count(0), "toggle\nquit\n").await;
        assert!(out.contains("! no items to toggle"));
    }

    #[tokio::test]
    async fn exhausted_script_shuts_down_cleanly() {
        let engine = LayoutEngine::new(demo()).unwrap();
        let (tx, rx) = mpsc::channel::<GridCommand>(COMMAND_CHANNEL_CAP);
        drop(tx);
        let mut runtime = GridRuntime::new(engine, rx, Vec::new(), Vec::new());
        let reason = runtime.run().await.unwrap();
        assert_eq!(reason, ShutdownReason::SourcesExhausted);
    }

    #[test]
    fn cli_overrides_map_onto_config() {
        let args = Args::parse_from(["gridview", "--columns", "4", "--seed", "2"]);
        let mut config = Config::default();
        assert_eq!(config.apply_overrides(&args.overrides()), 2);
        let options = engine_options(&config);
        assert_eq!(options.columns, 4);
        assert_eq!(options.seed, core_layout::ItemSeed::Count(2));
        assert_eq!(options.container_width, 310.0);
    }
}
