//! Interactive command source reading stdin line by line.
//!
//! Reading runs on a dedicated OS thread: a blocked `read` must not keep the
//! tokio runtime from shutting down after `quit`. The thread forwards raw lines
//! to a tokio task that parses them and feeds the command channel.

use std::io::BufRead;

use core_events::{CommandSource, GridCommand, parse_script_line, send_command};
use tokio::sync::mpsc::{self, Sender};
use tokio::task::JoinHandle;
use tracing::{error, warn};

pub struct StdinCommandSource;

impl CommandSource for StdinCommandSource {
    fn name(&self) -> &'static str {
        "stdin"
    }

    fn spawn(self: Box<Self>, tx: Sender<GridCommand>) -> JoinHandle<()> {
        let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
        let reader = std::thread::Builder::new()
            .name("stdin-commands".into())
            .spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
            });
        if let Err(e) = reader {
            error!(target: "runtime.commands", ?e, "stdin_thread_spawn_failed");
        }

        tokio::spawn(async move {
            loop {
                let line = tokio::select! {
                    biased;
                    _ = tx.closed() => break,
                    line = line_rx.recv() => match line {
                        Some(line) => line,
                        None => break,
                    },
                };
                match parse_script_line(&line) {
                    Ok(Some(cmd)) => {
                        if !send_command(&tx, cmd).await {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(target: "runtime.commands", %e, "command_parse_failed");
                        eprintln!("? {e}");
                    }
                }
            }
        })
    }
}
