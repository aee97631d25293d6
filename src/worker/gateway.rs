//! Bounded-time metadata requests with restart-on-failure.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use tracing::{debug, error, warn};

use super::error::{WorkerError, WorkerResult};
use super::protocol::{decode_rows, RequestOutcome, META_PATH, UNSUPPORTED_MEDIA_TYPE};
use super::supervisor::ProcessSupervisor;
use crate::config::RequestSettings;

/// Issues metadata requests to the supervised worker.
///
/// Each request runs on its own task and the caller waits on it with a
/// timeout, so a hung worker cannot hold the caller longer than the time
/// envelope. A request that times out is aborted, which drops the in-flight
/// HTTP call.
///
/// The gateway takes the supervisor by `&mut`, so at most one request is in
/// flight per supervisor.
#[derive(Debug, Clone)]
pub struct RequestGateway {
    http: reqwest::Client,
    timeout: Duration,
    accept: String,
}

/// Response from the worker, before the status is interpreted.
struct RawResponse {
    status: StatusCode,
    body: Vec<u8>,
}

impl RequestGateway {
    pub fn new(settings: &RequestSettings) -> WorkerResult<Self> {
        let http = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(WorkerError::transport)?;

        Ok(Self {
            http,
            timeout: settings.timeout(),
            accept: settings.accept.clone(),
        })
    }

    /// The time envelope applied to each request.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `payload` to the worker and interpret the answer.
    ///
    /// On [`RequestOutcome::Timeout`] or [`RequestOutcome::TransportError`]
    /// the worker is restarted before this returns. The request is not
    /// re-issued.
    ///
    /// # Errors
    ///
    /// - [`WorkerError::WorkerNotRunning`] if there is no live worker (no restart)
    /// - [`WorkerError::Decode`] if the body is empty or not two-column CSV (no restart)
    /// - [`WorkerError::UnexpectedStatus`] for statuses other than 2xx and 415 (no restart)
    pub async fn send(
        &self,
        supervisor: &mut ProcessSupervisor,
        payload: &[u8],
        content_type: Option<&str>,
    ) -> WorkerResult<RequestOutcome> {
        let base_url = match supervisor.base_url() {
            Some(url) if supervisor.is_running() => url,
            _ => {
                error!("worker is not running");
                return Err(WorkerError::WorkerNotRunning);
            }
        };

        let outcome = self.dispatch(&base_url, payload, content_type).await?;

        if outcome.requires_restart() {
            warn!(outcome = ?outcome, "worker unresponsive, restarting");
            if let Err(e) = supervisor.restart().await {
                error!(error = %e, "worker restart failed");
            }
        }

        Ok(outcome)
    }

    /// Perform one request against the worker at `base_url`.
    ///
    /// No lifecycle side effects; [`RequestGateway::send`] adds the
    /// precondition check and recovery.
    pub async fn dispatch(
        &self,
        base_url: &str,
        payload: &[u8],
        content_type: Option<&str>,
    ) -> WorkerResult<RequestOutcome> {
        let mut request = self
            .http
            .put(format!("{}{}", base_url, META_PATH))
            .header(ACCEPT, self.accept.as_str())
            .body(payload.to_vec());
        if let Some(content_type) = content_type {
            request = request.header(CONTENT_TYPE, content_type);
        }

        let task = tokio::spawn(async move {
            let response = request.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(RawResponse {
                status,
                body: body.to_vec(),
            })
        });
        let abort = task.abort_handle();

        let response = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(response))) => response,
            Ok(Ok(Err(e))) => {
                debug!(error = %e, "request failed");
                return Ok(RequestOutcome::TransportError(e.to_string()));
            }
            Ok(Err(e)) => {
                debug!(error = %e, "request task failed");
                return Ok(RequestOutcome::TransportError(e.to_string()));
            }
            Err(_) => {
                abort.abort();
                debug!(timeout = ?self.timeout, "request timed out");
                return Ok(RequestOutcome::Timeout);
            }
        };

        interpret(response)
    }
}

fn interpret(response: RawResponse) -> WorkerResult<RequestOutcome> {
    if response.status.as_u16() == UNSUPPORTED_MEDIA_TYPE {
        debug!("worker rejected input as unsupported");
        return Ok(RequestOutcome::UnsupportedFormat);
    }
    if !response.status.is_success() {
        warn!(status = %response.status, "unexpected worker status");
        return Err(WorkerError::UnexpectedStatus(response.status.as_u16()));
    }

    let rows = decode_rows(&response.body)?;
    if rows.is_empty() {
        warn!("worker answered without metadata");
        return Err(WorkerError::Decode("empty response body".to_string()));
    }
    debug!(entries = rows.len(), "metadata received");
    Ok(RequestOutcome::Success(rows))
}
