//! Background tasks of a Process Session

use std::sync::Weak;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{FramedRead, LinesCodec};

use super::SessionInner;
use crate::message::{LineParser, ParsedLine};
use crate::transport::{BoxedReader, BoxedWriter, ProcessHandle};
use crate::types::events::SessionEvent;

const READ_CHUNK: usize = 8 * 1024;

/// How long stdout is drained after the process has exited
const EXIT_DRAIN_WINDOW: Duration = Duration::from_millis(250);

/// Longest stderr line kept before it is cut
const MAX_STDERR_LINE: usize = 64 * 1024;

/// Writes queued lines to the engine's stdin
pub(super) async fn writer_task(mut stdin: BoxedWriter, mut outbound: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = outbound.recv().await {
        if let Err(e) = stdin.write_all(line.as_bytes()).await {
            log::warn!("Failed to write to droid stdin: {e}");
            break;
        }
        if let Err(e) = stdin.flush().await {
            log::warn!("Failed to flush droid stdin: {e}");
            break;
        }
    }
    let _ = stdin.shutdown().await;
}

/// Forwards stderr lines as [`SessionEvent::Stderr`]
pub(super) async fn stderr_task(inner: Weak<SessionInner>, stderr: BoxedReader) {
    let mut lines = FramedRead::new(stderr, LinesCodec::new_with_max_length(MAX_STDERR_LINE));
    while let Some(line) = lines.next().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match line {
            Ok(line) => {
                log::debug!("droid stderr: {line}");
                inner.emit(SessionEvent::Stderr(line));
            }
            Err(e) => {
                log::debug!("Skipping unreadable stderr line: {e}");
            }
        }
    }
}

/// Reads stdout, waits for exit and cleans up after the process
pub(super) async fn io_loop(
    inner: Weak<SessionInner>,
    generation: u64,
    mut stdout: BoxedReader,
    mut process: Box<dyn ProcessHandle>,
    mut kill_rx: oneshot::Receiver<()>,
) {
    let mut parser = LineParser::new();
    let mut buf = vec![0u8; READ_CHUNK];
    let mut stdout_open = true;
    let mut kill_requested = false;

    let exit_code = loop {
        tokio::select! {
            read = stdout.read(&mut buf), if stdout_open => match read {
                Ok(0) => stdout_open = false,
                Ok(n) => dispatch_all(&inner, generation, parser.push(&buf[..n])),
                Err(e) => {
                    log::warn!("Failed to read droid stdout: {e}");
                    stdout_open = false;
                }
            },
            // Resolves on dispose and when the last session handle is dropped.
            _ = &mut kill_rx, if !kill_requested => {
                kill_requested = true;
                if let Err(e) = process.start_kill() {
                    log::debug!("Failed to kill droid process: {e}");
                }
            }
            status = process.wait() => break match status {
                Ok(code) => code,
                Err(e) => {
                    log::warn!("Failed to wait for droid process: {e}");
                    None
                }
            },
        }
    };

    if stdout_open {
        let drain = async {
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => dispatch_all(&inner, generation, parser.push(&buf[..n])),
                }
            }
        };
        if tokio::time::timeout(EXIT_DRAIN_WINDOW, drain).await.is_err() {
            log::debug!("Gave up draining stdout of exited droid process");
        }
    }
    dispatch_all(&inner, generation, parser.flush());

    log::debug!("droid process exited with code {exit_code:?}");
    if let Some(inner) = inner.upgrade() {
        inner.handle_exit(generation, exit_code);
    }
}

fn dispatch_all(inner: &Weak<SessionInner>, generation: u64, items: Vec<ParsedLine>) {
    if items.is_empty() {
        return;
    }
    let Some(inner) = inner.upgrade() else {
        return;
    };
    for item in items {
        inner.dispatch(generation, item);
    }
}
