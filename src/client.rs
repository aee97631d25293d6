//! Process-isolated metadata extraction.
//!
//! [`IsolatedTika`] is the entry point most callers need. It owns one
//! supervised Tika server and serialises requests to it, so a parser that
//! hangs or crashes takes down the worker rather than the caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::metadata::Metadata;
use crate::worker::{
    resolve_artifact, ProcessSupervisor, RequestGateway, WorkerError, WorkerResult, WorkerState,
};

struct Inner {
    supervisor: ProcessSupervisor,
    gateway: RequestGateway,
}

/// Client for a supervised Tika server.
///
/// Construction starts the worker. Requests are serialised behind a mutex,
/// so the client can be shared between tasks but only one document is in
/// flight at a time.
///
/// Two flavours of each parse operation are offered: `try_parse_*` returns
/// the failure kind, `parse_*` returns `true` only on success and logs the
/// reason otherwise.
///
/// # Example
///
/// ```ignore
/// use isotika::{IsolatedTika, Metadata, Settings};
///
/// let tika = IsolatedTika::start(Settings::load()?).await?;
///
/// let mut metadata = Metadata::new();
/// if tika.parse_file("report.pdf", &mut metadata).await {
///     println!("{}", metadata);
/// }
///
/// tika.stop().await;
/// ```
pub struct IsolatedTika {
    inner: Mutex<Inner>,
    timeout: Duration,
}

impl IsolatedTika {
    /// Locate the worker jar and start the worker.
    pub async fn start(settings: Settings) -> WorkerResult<Self> {
        let artifact = resolve_artifact(&settings.worker)?;
        Self::start_with_artifact(settings, artifact).await
    }

    /// Start the worker from an explicit jar path.
    pub async fn start_with_artifact(
        settings: Settings,
        artifact: impl Into<PathBuf>,
    ) -> WorkerResult<Self> {
        let mut supervisor = ProcessSupervisor::new(settings.worker, artifact)?;
        let gateway = RequestGateway::new(&settings.request)?;
        supervisor.start().await?;

        Ok(Self {
            timeout: gateway.timeout(),
            inner: Mutex::new(Inner {
                supervisor,
                gateway,
            }),
        })
    }

    /// Parse a file, adding its metadata to `metadata`.
    ///
    /// Sets `resourceName` to the absolute path and, unless `metadata`
    /// already carries a `Content-Type`, hints the type from the extension.
    /// A missing file leaves `metadata` untouched.
    pub async fn try_parse_file(
        &self,
        path: impl AsRef<Path>,
        metadata: &mut Metadata,
    ) -> WorkerResult<()> {
        let path = path.as_ref();
        let is_file = tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(WorkerError::FileNotFound(path.to_path_buf()));
        }

        let data = tokio::fs::read(path).await?;
        let absolute = tokio::fs::canonicalize(path).await?;
        debug!(path = %absolute.display(), "processing");

        let hint = match metadata.get(Metadata::CONTENT_TYPE) {
            Some(content_type) => Some(content_type.to_string()),
            None => mime_guess::from_path(path).first_raw().map(str::to_string),
        };
        metadata.set(Metadata::RESOURCE_NAME, absolute.to_string_lossy());

        self.try_parse_bytes(&data, hint.as_deref(), metadata).await
    }

    /// Parse raw bytes.
    ///
    /// `content_type` is forwarded to the worker as a parsing hint; when it
    /// is `None`, an existing `Content-Type` entry in `metadata` is used.
    pub async fn try_parse_bytes(
        &self,
        data: &[u8],
        content_type: Option<&str>,
        metadata: &mut Metadata,
    ) -> WorkerResult<()> {
        let hint = content_type
            .or_else(|| metadata.get(Metadata::CONTENT_TYPE))
            .map(str::to_string);

        let outcome = {
            let mut inner = self.inner.lock().await;
            let Inner {
                supervisor,
                gateway,
            } = &mut *inner;
            gateway.send(supervisor, data, hint.as_deref()).await?
        };

        outcome.apply_to(metadata);
        debug!(entries = metadata.len(), "metadata entries");
        outcome.into_result(self.timeout).map(|_| ())
    }

    /// Read `reader` to the end and parse the bytes.
    ///
    /// The reader stays with the caller and is not closed.
    pub async fn try_parse_reader<R>(
        &self,
        reader: &mut R,
        content_type: Option<&str>,
        metadata: &mut Metadata,
    ) -> WorkerResult<()>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        self.try_parse_bytes(&data, content_type, metadata).await
    }

    /// Like [`IsolatedTika::try_parse_file`], reporting only success.
    pub async fn parse_file(&self, path: impl AsRef<Path>, metadata: &mut Metadata) -> bool {
        report(self.try_parse_file(path, metadata).await)
    }

    /// Like [`IsolatedTika::try_parse_bytes`], reporting only success.
    pub async fn parse_bytes(
        &self,
        data: &[u8],
        content_type: Option<&str>,
        metadata: &mut Metadata,
    ) -> bool {
        report(self.try_parse_bytes(data, content_type, metadata).await)
    }

    /// Like [`IsolatedTika::try_parse_reader`], reporting only success.
    pub async fn parse_reader<R>(
        &self,
        reader: &mut R,
        content_type: Option<&str>,
        metadata: &mut Metadata,
    ) -> bool
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        report(self.try_parse_reader(reader, content_type, metadata).await)
    }

    /// Replace the worker with a fresh one.
    pub async fn restart(&self) -> WorkerResult<u16> {
        self.inner.lock().await.supervisor.restart().await
    }

    /// Kill the worker. Safe to call repeatedly.
    pub async fn stop(&self) {
        info!("stopping isolated worker");
        self.inner.lock().await.supervisor.stop().await;
    }

    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.supervisor.is_running()
    }

    pub async fn state(&self) -> WorkerState {
        self.inner.lock().await.supervisor.state()
    }

    /// Port of the current worker, for diagnostics.
    pub async fn port(&self) -> Option<u16> {
        self.inner.lock().await.supervisor.port()
    }

    pub async fn restart_count(&self) -> u64 {
        self.inner.lock().await.supervisor.restart_count()
    }
}

fn report(result: WorkerResult<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(WorkerError::FileNotFound(path)) => {
            debug!(path = %path.display(), "file not found");
            false
        }
        Err(e) if e.is_worker_unavailable() => {
            error!(error = %e, "no usable worker");
            false
        }
        Err(e) => {
            warn!(error = %e, "parse failed");
            false
        }
    }
}
