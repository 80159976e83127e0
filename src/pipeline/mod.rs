// Copy pipeline - reader and writer around a bounded queue

use crate::error::Result;
use crate::state::OutputState;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Chunks buffered between reader and writer; a full queue blocks the reader,
/// which is the backpressure the upstream producer sees
pub const QUEUE_DEPTH: usize = 64;

/// The reader/writer queue
pub fn channel() -> (mpsc::Sender<Vec<u8>>, mpsc::Receiver<Vec<u8>>) {
    mpsc::channel(QUEUE_DEPTH)
}

/// Consume the input stream into the queue, one newline-terminated chunk at a
/// time (plus a final partial chunk, if any).
///
/// The sequence is finite and non-restartable: end-of-stream closes the
/// queue, which is what drives pipeline shutdown. A read error ends the
/// stream the same way, after a diagnostic.
pub async fn read_chunks<R>(mut input: R, queue: mpsc::Sender<Vec<u8>>)
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut chunk = Vec::new();
        match input.read_until(b'\n', &mut chunk).await {
            Ok(0) => break,
            Ok(_) => {
                if queue.send(chunk).await.is_err() {
                    // Writer is gone; nothing left to feed
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "input read failed, ending stream");
                break;
            }
        }
    }
}

/// Drain the queue in order: every chunk goes to the output file first, then
/// is mirrored to the passthrough output.
///
/// An output-file error is returned to the caller, which must treat it as
/// fatal; continuing would silently diverge file and stream. Mirror errors
/// are ignored, matching plain tee behavior when a consumer closes its end.
pub async fn write_chunks<W>(
    mut queue: mpsc::Receiver<Vec<u8>>,
    state: Arc<OutputState>,
    mut passthrough: W,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(chunk) = queue.recv().await {
        state.write(&chunk).await?;

        if passthrough.write_all(&chunk).await.is_ok() {
            let _ = passthrough.flush().await;
        }
    }
    Ok(())
}
