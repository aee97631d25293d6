//! Stand-in for the Tika server, used by the integration tests.
//!
//! Accepts the same command line as the real worker
//! (`[runtime args..] -jar <artifact> -p <port>`), ignores everything except
//! the port, and serves `/version` and `/meta`.
//!
//! Behaviour of `/meta` depends on the payload prefix:
//!
//! | Prefix        | Response                                        |
//! |---------------|-------------------------------------------------|
//! | `HANG`        | never answers                                   |
//! | `CRASH`       | the process exits                               |
//! | `UNSUPPORTED` | 415                                             |
//! | `MALFORMED`   | 200 with a one-column row                       |
//! | `EMPTY`       | 200 with an empty body                          |
//! | `MULTI`       | normal rows plus two `dc:creator` values        |
//! | anything else | `Content-Type` and `Content-Length` rows        |
//!
//! Environment:
//! - `STUB_WORKER_NEVER_READY` - `/version` answers 503 forever
//! - `STUB_WORKER_VERSION_DELAY_MS=<ms>` - `/version` waits that long before answering
//! - `STUB_WORKER_EXIT_ON_START` - exit with status 2 before listening
//! - `STUB_WORKER_CHATTY=<bytes>` - write that many bytes to stdout at startup

use std::env;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::Router;

struct StubState {
    never_ready: bool,
    version_delay: Option<Duration>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let port = port_from_args(env::args().skip(1))?;

    if env::var_os("STUB_WORKER_EXIT_ON_START").is_some() {
        eprintln!("stub worker: refusing to start");
        std::process::exit(2);
    }

    if let Some(bytes) = env::var("STUB_WORKER_CHATTY")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
    {
        let mut stdout = std::io::stdout().lock();
        let line = b"INFO  [main] org.apache.tika.server.TikaServerCli - loading parsers\n";
        let mut written = 0;
        while written < bytes {
            stdout.write_all(line)?;
            written += line.len();
        }
        stdout.flush()?;
    }

    let state = Arc::new(StubState {
        never_ready: env::var_os("STUB_WORKER_NEVER_READY").is_some(),
        version_delay: env::var("STUB_WORKER_VERSION_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis),
    });

    let app = Router::new()
        .route("/version", get(version))
        .route("/meta", put(meta))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("binding port {}", port))?;
    println!("stub worker listening on 127.0.0.1:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

fn port_from_args(mut args: impl Iterator<Item = String>) -> Result<u16> {
    while let Some(arg) = args.next() {
        if arg == "-p" {
            let value = args.next().context("-p needs a value")?;
            return value
                .parse()
                .with_context(|| format!("invalid port {:?}", value));
        }
    }
    bail!("missing -p <port>")
}

async fn version(State(state): State<Arc<StubState>>) -> Response {
    if let Some(delay) = state.version_delay {
        tokio::time::sleep(delay).await;
    }
    if state.never_ready {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    "Apache Tika 1.5 (stub)".into_response()
}

async fn meta(headers: HeaderMap, body: Bytes) -> Response {
    println!("PUT /meta {} bytes", body.len());

    if body.starts_with(b"HANG") {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
    if body.starts_with(b"CRASH") {
        eprintln!("stub worker: crashing on request");
        std::process::exit(1);
    }
    if body.starts_with(b"UNSUPPORTED") {
        return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
    }
    if body.starts_with(b"MALFORMED") {
        return csv_response("no-comma-here\n".to_string());
    }
    if body.starts_with(b"EMPTY") {
        return csv_response(String::new());
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");

    let mut rows = vec![
        ("Content-Type".to_string(), content_type.to_string()),
        ("Content-Length".to_string(), body.len().to_string()),
    ];
    if body.starts_with(b"MULTI") {
        rows.push(("dc:creator".to_string(), "alice".to_string()));
        rows.push(("dc:creator".to_string(), "bob".to_string()));
    }

    match encode_rows(&rows) {
        Ok(csv) => csv_response(csv),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

fn encode_rows(rows: &[(String, String)]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for (key, value) in rows {
        writer.write_record([key, value])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("flushing csv: {}", e))?;
    Ok(String::from_utf8(bytes)?)
}

fn csv_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/csv")], body).into_response()
}
