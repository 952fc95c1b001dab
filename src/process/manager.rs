//! Subprocess isolation and messaging.
//!
//! Each dispatch attempt runs inside its own subprocess with a structured
//! message channel: the child writes one JSON message per stdout line, the
//! core replies on the child's stdin. The message stream completes when the
//! subprocess exits, *regardless* of exit code — exit is normal termination
//! from this component's perspective and the code is only logged. Respawn
//! on failure is the caller's responsibility.

use std::process::Stdio;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, Notify};

use crate::process::protocol::{CoreMessage, JobMessage};

/// Errors surfaced by the process manager.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// OS-level spawn failure.
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The child's stdio pipes could not be acquired.
    #[error("Subprocess stdio unavailable for '{0}'")]
    Stdio(String),
}

/// Handle to a running subprocess; lets the owner reply to its messages or
/// terminate it early.
#[derive(Clone)]
pub struct ProcessHandle {
    id: String,
    replies: mpsc::UnboundedSender<CoreMessage>,
    kill: Arc<Notify>,
}

impl ProcessHandle {
    /// Queue a message for delivery on the child's stdin.
    ///
    /// Returns false if the child already exited.
    pub fn send(&self, message: CoreMessage) -> bool {
        self.replies.send(message).is_ok()
    }

    /// Ask for the child to be killed. Idempotent.
    pub fn terminate(&self) {
        self.kill.notify_one();
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Spawns isolated subprocesses and exposes their output as typed message
/// streams.
#[derive(Default)]
pub struct ProcessManager {
    active: Arc<DashMap<String, ()>>,
}

impl ProcessManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a subprocess for `id` and return its handle plus a stream of
    /// parsed messages. The stream ends on subprocess exit.
    pub fn run(
        &self,
        id: &str,
        program: &str,
        args: &[String],
    ) -> Result<(ProcessHandle, mpsc::UnboundedReceiver<JobMessage>), ProcessError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProcessError::Stdio(id.to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProcessError::Stdio(id.to_string()))?;

        self.active.insert(id.to_string(), ());

        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<CoreMessage>();
        let (message_tx, message_rx) = mpsc::unbounded_channel::<JobMessage>();
        let kill = Arc::new(Notify::new());

        // writer task: drains queued replies onto the child's stdin
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(message) = reply_rx.recv().await {
                let mut line = match serde_json::to_string(&message) {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to encode core message");
                        continue;
                    }
                };
                line.push('\n');
                if stdin.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
            }
        });

        // reader task: owns the child, parses stdout lines, reaps on exit
        let active = Arc::clone(&self.active);
        let task_id = id.to_string();
        let task_kill = Arc::clone(&kill);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();

            loop {
                tokio::select! {
                    _ = task_kill.notified() => {
                        tracing::warn!(id = %task_id, "Terminating subprocess");
                        let _ = child.kill().await;
                        break;
                    }
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            let line = line.trim();
                            if line.is_empty() {
                                continue;
                            }
                            match JobMessage::parse(line) {
                                Ok(message) => {
                                    // receiver gone means the attempt was abandoned
                                    let _ = message_tx.send(message);
                                }
                                Err(e) => {
                                    tracing::warn!(
                                        id = %task_id,
                                        error = %e,
                                        "Dropping unparseable subprocess message"
                                    );
                                }
                            }
                        }
                        Ok(None) | Err(_) => break,
                    }
                }
            }

            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    tracing::warn!(id = %task_id, error = %e, "Failed to reap subprocess");
                    None
                }
            };
            tracing::info!(id = %task_id, code = ?code, "Process exit");
            active.remove(&task_id);
            // message_tx drops here, completing the stream
        });

        let handle = ProcessHandle {
            id: id.to_string(),
            replies: reply_tx,
            kill,
        };

        Ok((handle, message_rx))
    }

    /// Whether a process for `id` is currently registered.
    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains_key(id)
    }
}
