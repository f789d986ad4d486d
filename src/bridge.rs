//! Persistent PHP parser subprocess transport.
//!
//! A single long-lived parser process serves all parse requests over a
//! framed stdin/stdout protocol:
//!
//! ```text
//! request:  <decimal source length>\n<source bytes>
//! success:  <decimal result length>\n<result bytes>
//! failure:  0\n<error line>
//! ```
//!
//! Callers hold an exclusive lock for the full round trip, so the parser
//! only ever sees one outstanding request. A timeout or a broken frame
//! invalidates the transport; a parser-reported rejection does not.

use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use crate::tree::{decode_payload, ParsePayload, TreeValue};

/// How long shutdown waits for the parser to exit after stdin closes.
const EXIT_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("parser bridge is not active")]
    Inactive,
    #[error("timeout waiting for parser response")]
    Timeout,
    #[error("parser transport failed: {0}")]
    Transport(String),
    #[error("parser rejected input: {0}")]
    Parser(String),
    #[error("malformed parser payload: {0}")]
    Protocol(String),
}

struct Conn {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Handle to the parser subprocess. One per process; the engine owns it.
pub struct ParserBridge {
    timeout: Duration,
    /// `None` once the transport has been invalidated or shut down.
    conn: Mutex<Option<Conn>>,
    /// Observer signal: resolves with a description of the exit condition.
    exit_rx: Mutex<Option<oneshot::Receiver<String>>>,
}

impl ParserBridge {
    /// Spawn the parser and begin observing its exit.
    pub fn spawn(command: &str, args: &[String], timeout: Duration) -> Result<Self, BridgeError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BridgeError::Transport(format!("failed to spawn {command}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::Transport("parser stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Transport("parser stdout unavailable".into()))?;

        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let outcome = match child.wait().await {
                Ok(status) => format!("parser exited: {status}"),
                Err(e) => format!("failed to observe parser exit: {e}"),
            };
            debug!("{outcome}");
            let _ = tx.send(outcome);
        });

        Ok(Self {
            timeout,
            conn: Mutex::new(Some(Conn {
                stdin,
                stdout: BufReader::new(stdout),
            })),
            exit_rx: Mutex::new(Some(rx)),
        })
    }

    /// Whether the transport is still believed usable.
    pub async fn is_active(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Parse one source file. Holds the transport for the full round trip.
    pub async fn parse(&self, source: &[u8]) -> Result<TreeValue, BridgeError> {
        if source.is_empty() {
            return Err(BridgeError::Protocol("empty source".into()));
        }

        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(BridgeError::Inactive)?;

        match tokio::time::timeout(self.timeout, round_trip(conn, source)).await {
            Ok(Ok(payload)) => match decode_payload(&payload) {
                Ok(ParsePayload::Tree(tree)) => Ok(tree),
                Ok(ParsePayload::Rejected(reason)) => Err(BridgeError::Parser(reason)),
                Err(e) => Err(BridgeError::Protocol(e.to_string())),
            },
            Ok(Err(e)) => {
                // Broken frame: the transport cannot be trusted any more.
                *guard = None;
                Err(e)
            }
            Err(_) => {
                *guard = None;
                Err(BridgeError::Timeout)
            }
        }
    }

    /// Close the request pipe, wait for the exit observer, drop the
    /// response pipe. Safe to call more than once.
    pub async fn shutdown(&self) {
        let conn = self.conn.lock().await.take();
        if let Some(conn) = conn {
            // Dropping stdin delivers EOF to the parser.
            drop(conn.stdin);
            let rx = self.exit_rx.lock().await.take();
            if let Some(rx) = rx {
                if tokio::time::timeout(EXIT_WAIT, rx).await.is_err() {
                    warn!("timeout waiting for parser exit signal");
                }
            }
            drop(conn.stdout);
        }
    }
}

/// One framed request/response exchange. Errors here are transport errors.
async fn round_trip(conn: &mut Conn, source: &[u8]) -> Result<Vec<u8>, BridgeError> {
    let header = format!("{}\n", source.len());
    conn.stdin
        .write_all(header.as_bytes())
        .await
        .map_err(|e| BridgeError::Transport(format!("failed to write length header: {e}")))?;
    conn.stdin
        .write_all(source)
        .await
        .map_err(|e| BridgeError::Transport(format!("failed to write source: {e}")))?;
    conn.stdin
        .flush()
        .await
        .map_err(|e| BridgeError::Transport(format!("failed to flush request: {e}")))?;

    let mut line = String::new();
    let n = conn
        .stdout
        .read_line(&mut line)
        .await
        .map_err(|e| BridgeError::Transport(format!("failed to read length header: {e}")))?;
    if n == 0 {
        return Err(BridgeError::Transport(
            "parser closed the response pipe (EOF)".into(),
        ));
    }

    let result_len: i64 = line
        .trim()
        .parse()
        .map_err(|_| BridgeError::Transport(format!("unreadable length header {:?}", line.trim())))?;
    if result_len < 0 {
        return Err(BridgeError::Transport(format!(
            "negative response length {result_len}"
        )));
    }

    if result_len == 0 {
        // Parser-level failure: the error description follows on one line.
        let mut reason = String::new();
        let _ = conn.stdout.read_line(&mut reason).await;
        let reason = reason.trim().to_string();
        // Report through the payload path so the caller sees a Parser error.
        let body = serde_json::json!({ "reason": reason });
        return Ok(serde_json::to_vec(&body).unwrap_or_default());
    }

    let mut payload = vec![0u8; result_len as usize];
    conn.stdout
        .read_exact(&mut payload)
        .await
        .map_err(|e| BridgeError::Transport(format!("short read of response body: {e}")))?;
    Ok(payload)
}
