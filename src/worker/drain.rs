//! Background consumption of worker output.
//!
//! A child whose stdout/stderr pipes are never read blocks as soon as the OS
//! pipe buffer fills up. A Tika server logs on every request, so an undrained
//! worker stalls after a few hundred documents. [`OutputDrain`] keeps both
//! pipes empty for the lifetime of the process and keeps the bytes around for
//! diagnostics.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

const CHUNK_SIZE: usize = 8 * 1024;

/// Pause after a failed read so a persistent error does not spin the task.
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Merged stdout/stderr of one worker process.
type DrainBuffer = Arc<Mutex<Vec<u8>>>;

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn as_str(self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

enum Event {
    Stop,
    Read(Stream, io::Result<usize>),
}

/// Handle to the task draining a worker's output pipes.
///
/// The task ends when both pipes reach EOF (the process exited) or when
/// [`OutputDrain::stop`] is called.
#[derive(Debug)]
pub struct OutputDrain {
    buffer: DrainBuffer,
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl OutputDrain {
    /// Start draining. Must be called from within a tokio runtime.
    pub fn attach<O, E>(stdout: Option<O>, stderr: Option<E>) -> Self
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let buffer: DrainBuffer = Arc::new(Mutex::new(Vec::new()));
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(drain_loop(stdout, stderr, buffer.clone(), stop_rx));

        Self {
            buffer,
            stop_tx: Some(stop_tx),
            task,
        }
    }

    /// Copy of everything drained so far.
    pub fn output(&self) -> Vec<u8> {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Last `max_bytes` of output, decoded lossily.
    pub fn tail(&self, max_bytes: usize) -> String {
        let buffer = self
            .buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let start = buffer.len().saturating_sub(max_bytes);
        String::from_utf8_lossy(&buffer[start..]).into_owned()
    }

    /// Whether the drain task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the task to stop and wait for it.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            debug!(error = %e, "drain task ended abnormally");
        }
    }
}

async fn drain_loop<O, E>(
    mut stdout: Option<O>,
    mut stderr: Option<E>,
    buffer: DrainBuffer,
    mut stop_rx: oneshot::Receiver<()>,
) where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out_chunk = vec![0u8; CHUNK_SIZE];
    let mut err_chunk = vec![0u8; CHUNK_SIZE];

    while stdout.is_some() || stderr.is_some() {
        let event = tokio::select! {
            _ = &mut stop_rx => Event::Stop,
            res = read_some(&mut stdout, &mut out_chunk), if stdout.is_some() => {
                Event::Read(Stream::Stdout, res)
            }
            res = read_some(&mut stderr, &mut err_chunk), if stderr.is_some() => {
                Event::Read(Stream::Stderr, res)
            }
        };

        match event {
            Event::Stop => {
                trace!("drain stopped");
                return;
            }
            Event::Read(stream, Ok(0)) => {
                trace!(stream = stream.as_str(), "worker closed pipe");
                match stream {
                    Stream::Stdout => stdout = None,
                    Stream::Stderr => stderr = None,
                }
            }
            Event::Read(stream, Ok(n)) => {
                let chunk = match stream {
                    Stream::Stdout => &out_chunk[..n],
                    Stream::Stderr => &err_chunk[..n],
                };
                record(&buffer, stream, chunk);
            }
            Event::Read(stream, Err(e)) => {
                warn!(stream = stream.as_str(), error = %e, "failed to read worker output");
                tokio::time::sleep(READ_ERROR_BACKOFF).await;
            }
        }
    }

    trace!("drain finished: worker output closed");
}

async fn read_some<R: AsyncRead + Unpin>(
    reader: &mut Option<R>,
    chunk: &mut [u8],
) -> io::Result<usize> {
    match reader {
        Some(r) => r.read(chunk).await,
        None => Ok(0),
    }
}

fn record(buffer: &DrainBuffer, stream: Stream, chunk: &[u8]) {
    buffer
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .extend_from_slice(chunk);

    for line in String::from_utf8_lossy(chunk).lines() {
        if !line.trim().is_empty() {
            trace!(target: "isotika::worker", stream = stream.as_str(), "{}", line);
        }
    }
}
