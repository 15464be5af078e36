//! Consumer commands and the async sources that produce them.
//!
//! The layout consumer never touches the engine from a foreign task. Every
//! mutation request is a [`GridCommand`] pushed into a bounded mpsc channel and
//! applied by the single event loop that owns the engine (the publish context).

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// Bounded channel with awaiting sends: a source parks until the loop catches up rather than
// dropping commands. Commands are cheap and low-rate (human or scripted), so the cap only matters
// for pathological scripts.
// -------------------------------------------------------------------------------------------------
pub const COMMAND_CHANNEL_CAP: usize = 256;

pub static COMMANDS_SENT: AtomicU64 = AtomicU64::new(0);
pub static COMMAND_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static COMMAND_PARSE_FAILURES: AtomicU64 = AtomicU64::new(0);

/// Point-in-time copy of the process-wide command counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandTelemetry {
    pub sent: u64,
    pub send_failures: u64,
    pub parse_failures: u64,
}

pub fn command_telemetry() -> CommandTelemetry {
    CommandTelemetry {
        sent: COMMANDS_SENT.load(Ordering::Relaxed),
        send_failures: COMMAND_SEND_FAILURES.load(Ordering::Relaxed),
        parse_failures: COMMAND_PARSE_FAILURES.load(Ordering::Relaxed),
    }
}

/// Mutation and control requests issued by a layout consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum GridCommand {
    /// Insert a new item before `at` (append when out of range).
    Add { at: usize },
    /// Remove the item at `at` (the last one when out of range).
    Remove { at: usize },
    SetColumns(usize),
    SetWidth(f64),
    SetSpacing(f64),
    /// Flip the view state of the item at `index`, or of a random item when
    /// no index is given.
    Toggle { index: Option<usize> },
    /// Redraw without changing anything.
    Render,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("`{0}` requires an argument")]
    MissingArgument(&'static str),
    #[error("invalid argument `{value}` for `{command}`")]
    InvalidArgument { command: &'static str, value: String },
    #[error("unexpected trailing input `{0}`")]
    TrailingInput(String),
}

fn parse_arg<T: FromStr>(command: &'static str, value: &str) -> Result<T, CommandParseError> {
    value
        .parse()
        .map_err(|_| CommandParseError::InvalidArgument {
            command,
            value: value.to_string(),
        })
}

impl FromStr for GridCommand {
    type Err = CommandParseError;

    /// Parse `verb [arg]`. `add` and `remove` default to index 0 (the front
    /// of the grid).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let verb = parts.next().ok_or(CommandParseError::Empty)?;
        let arg = parts.next();
        if let Some(extra) = parts.next() {
            return Err(CommandParseError::TrailingInput(extra.to_string()));
        }

        let required =
            |command: &'static str| arg.ok_or(CommandParseError::MissingArgument(command));

        let cmd = match verb.to_ascii_lowercase().as_str() {
            "add" => GridCommand::Add {
                at: arg.map(|a| parse_arg("add", a)).transpose()?.unwrap_or(0),
            },
            "remove" | "rm" => GridCommand::Remove {
                at: arg.map(|a| parse_arg("remove", a)).transpose()?.unwrap_or(0),
            },
            "columns" | "cols" => {
                GridCommand::SetColumns(parse_arg("columns", required("columns")?)?)
            }
            "width" => GridCommand::SetWidth(parse_arg("width", required("width")?)?),
            "spacing" => GridCommand::SetSpacing(parse_arg("spacing", required("spacing")?)?),
            "toggle" | "flip" => GridCommand::Toggle {
                index: arg.map(|a| parse_arg("toggle", a)).transpose()?,
            },
            "render" => GridCommand::Render,
            "quit" | "q" => GridCommand::Quit,
            other => return Err(CommandParseError::Unknown(other.to_string())),
        };
        Ok(cmd)
    }
}

impl fmt::Display for GridCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridCommand::Add { at } => write!(f, "add {at}"),
            GridCommand::Remove { at } => write!(f, "remove {at}"),
            GridCommand::SetColumns(c) => write!(f, "columns {c}"),
            GridCommand::SetWidth(w) => write!(f, "width {w}"),
            GridCommand::SetSpacing(s) => write!(f, "spacing {s}"),
            GridCommand::Toggle { index: Some(index) } => write!(f, "toggle {index}"),
            GridCommand::Toggle { index: None } => f.write_str("toggle"),
            GridCommand::Render => f.write_str("render"),
            GridCommand::Quit => f.write_str("quit"),
        }
    }
}

/// Parse one line of a command script. Blank lines and `#` comments yield
/// `Ok(None)`.
pub fn parse_script_line(line: &str) -> Result<Option<GridCommand>, CommandParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    trimmed.parse().map(Some).inspect_err(|_| {
        COMMAND_PARSE_FAILURES.fetch_add(1, Ordering::Relaxed);
    })
}

/// Send with telemetry. Returns `false` once the receiving loop is gone.
pub async fn send_command(tx: &Sender<GridCommand>, cmd: GridCommand) -> bool {
    match tx.send(cmd).await {
        Ok(()) => {
            COMMANDS_SENT.fetch_add(1, Ordering::Relaxed);
            true
        }
        Err(_) => {
            COMMAND_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
            false
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Async Command Sources
// -------------------------------------------------------------------------------------------------

/// Anything that feeds commands into the event loop. Implementors spawn one
/// task that stops when `tx.send(..)` fails (loop dropped the receiver) or when
/// they run out of input.
pub trait CommandSource: Send + 'static {
    /// Stable identifier for logs.
    fn name(&self) -> &'static str;
    fn spawn(self: Box<Self>, tx: Sender<GridCommand>) -> JoinHandle<()>;
}

/// Registry of sources spawned together at startup.
#[derive(Default)]
pub struct CommandSourceRegistry {
    sources: Vec<Box<dyn CommandSource>>,
}

impl CommandSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S: CommandSource>(&mut self, src: S) {
        self.sources.push(Box::new(src));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Spawn every registered source with its own `Sender` clone. Sources are
    /// drained, so a second call spawns nothing. During shutdown drop the
    /// caller's `Sender` before awaiting the handles.
    pub fn spawn_all(&mut self, tx: &Sender<GridCommand>) -> Vec<JoinHandle<()>> {
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "runtime.commands", source = name, "spawning command source");
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}

/// Replays a fixed command list, optionally pacing commands apart.
pub struct ScriptedCommandSource {
    commands: Vec<GridCommand>,
    pace: Option<Duration>,
}

impl ScriptedCommandSource {
    pub fn new(commands: Vec<GridCommand>) -> Self {
        Self {
            commands,
            pace: None,
        }
    }

    pub fn paced(mut self, pace: Duration) -> Self {
        self.pace = Some(pace);
        self
    }

    /// Build from script text, skipping blanks and comments. Fails on the
    /// first malformed line, reporting its 1-based line number.
    pub fn from_script(script: &str) -> Result<Self, (usize, CommandParseError)> {
        let mut commands = Vec::new();
        for (idx, line) in script.lines().enumerate() {
            if let Some(cmd) = parse_script_line(line).map_err(|e| (idx + 1, e))? {
                commands.push(cmd);
            }
        }
        Ok(Self::new(commands))
    }
}

impl CommandSource for ScriptedCommandSource {
    fn name(&self) -> &'static str {
        "script"
    }

    fn spawn(self: Box<Self>, tx: Sender<GridCommand>) -> JoinHandle<()> {
        let ScriptedCommandSource { commands, pace } = *self;
        tokio::spawn(async move {
            for cmd in commands {
                if let Some(pace) = pace {
                    tokio::time::sleep(pace).await;
                }
                tracing::trace!(target: "runtime.commands", %cmd, "script_command");
                if !send_command(&tx, cmd).await {
                    break;
                }
            }
        })
    }
}
