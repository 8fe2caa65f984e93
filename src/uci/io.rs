//! Channel plumbing between the session and the engine's byte streams.
//!
//! Commands go out through an unbounded channel so the sender never blocks
//! on a wedged engine; lines come back the same way. Channel closure is the
//! liveness signal in both directions: a dropped command receiver means the
//! writer task (and so the engine) is gone, and the line channel ending
//! means the engine closed its output.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// Spawn a task that writes each queued command to `writer`, one per line.
/// The returned sender is what [`super::EngineSession`] attaches to. The
/// task ends when the sender side is dropped or a write fails.
pub fn command_writer<W>(mut writer: W) -> UnboundedSender<String>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            let line = format!("{cmd}\n");
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                warn!("engine stdin write failed: {e}");
                break;
            }
            if let Err(e) = writer.flush().await {
                warn!("engine stdin flush failed: {e}");
                break;
            }
        }
        debug!("command writer task finished");
    });
    tx
}

/// Spawn a task that reads `reader` line by line and forwards each line.
/// The channel closes at end of stream, which is how a caller learns the
/// engine went away.
pub fn line_reader<R>(reader: R) -> UnboundedReceiver<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("engine stdout read failed: {e}");
                    break;
                }
            }
        }
        debug!("line reader task finished");
    });
    rx
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
