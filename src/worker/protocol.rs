//! HTTP protocol spoken by the Tika server worker.
//!
//! Only two endpoints are used:
//!
//! | Method | Path       | Purpose                                      |
//! |--------|------------|----------------------------------------------|
//! | GET    | `/version` | readiness probe, any 2xx means ready         |
//! | PUT    | `/meta`    | document bytes in, `key,value` CSV rows out  |
//!
//! A `415 Unsupported Media Type` from `/meta` means the worker has no parser
//! for the input. That is an answer, not a failure of the worker.

use crate::metadata::Metadata;

use super::error::{WorkerError, WorkerResult};

/// Readiness endpoint.
pub const VERSION_PATH: &str = "/version";

/// Metadata extraction endpoint.
pub const META_PATH: &str = "/meta";

/// Media type requested from the metadata endpoint.
pub const CSV_MEDIA_TYPE: &str = "text/csv";

/// Status the worker uses for inputs it cannot parse.
pub const UNSUPPORTED_MEDIA_TYPE: u16 = 415;

/// Value stored under [`Metadata::PARSE_FAILURE_415`].
pub const SENTINEL_VALUE: &str = "true";

/// Base URL of a worker listening on `host:port`.
pub fn base_url(host: &str, port: u16) -> String {
    format!("http://{}:{}", host, port)
}

/// Result of a single metadata request.
///
/// Produced once per call and handed straight back to the caller; nothing
/// about the last response is kept in shared state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The worker parsed the input.
    Success(Metadata),
    /// The worker answered 415.
    UnsupportedFormat,
    /// The request exceeded its time envelope.
    Timeout,
    /// The exchange failed below HTTP (refused, reset, task aborted).
    TransportError(String),
}

impl RequestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Whether the worker is presumed stuck or dead after this outcome.
    pub fn requires_restart(&self) -> bool {
        matches!(self, Self::Timeout | Self::TransportError(_))
    }

    /// Record the outcome in the caller's metadata.
    ///
    /// Successful rows are appended without deduplication; an unsupported
    /// format leaves the `parseFailure415 = true` sentinel. Failures add
    /// nothing.
    pub fn apply_to(&self, sink: &mut Metadata) {
        match self {
            Self::Success(rows) => {
                for (key, value) in rows.iter() {
                    sink.add(key, value);
                }
            }
            Self::UnsupportedFormat => sink.add(Metadata::PARSE_FAILURE_415, SENTINEL_VALUE),
            Self::Timeout | Self::TransportError(_) => {}
        }
    }

    /// Convert into a result, keeping the failure kind.
    pub fn into_result(self, timeout: std::time::Duration) -> WorkerResult<Metadata> {
        match self {
            Self::Success(rows) => Ok(rows),
            Self::UnsupportedFormat => Err(WorkerError::UnsupportedFormat),
            Self::Timeout => Err(WorkerError::Timeout(timeout)),
            Self::TransportError(message) => Err(WorkerError::Transport(message)),
        }
    }
}

/// Decode a `/meta` response body into ordered key/value rows.
///
/// Every record must have exactly two fields. Quoted fields may contain
/// commas and newlines.
pub fn decode_rows(body: &[u8]) -> WorkerResult<Metadata> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body);

    let mut rows = Metadata::new();
    for record in reader.records() {
        let record = record?;
        if record.len() != 2 {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            return Err(WorkerError::Decode(format!(
                "line {}: expected 2 columns, found {}",
                line,
                record.len()
            )));
        }
        rows.add(&record[0], &record[1]);
    }
    Ok(rows)
}
