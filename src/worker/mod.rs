//! Worker supervision module.
//!
//! This module runs a Tika server as a child process and talks to it over
//! HTTP. Parsers inside the worker may hang or crash; the supervisor contains
//! the damage by killing and replacing the worker instead of letting the fault
//! reach the caller.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     isotika (Rust + Tokio)                      │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                     RequestGateway                        │  │
//! │  │  - PUT /meta on a per-request task with a time envelope   │  │
//! │  │  - CSV rows -> Metadata, 415 -> sentinel                  │  │
//! │  │  - timeout / transport error -> supervisor.restart()      │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                    ProcessSupervisor                      │  │
//! │  │  - PortAllocator picks a free port                        │  │
//! │  │  - spawns `java -jar tika-server.jar -p <port>`           │  │
//! │  │  - polls GET /version until ready                         │  │
//! │  │  - OutputDrain empties stdout/stderr                      │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │                              │                                  │
//! │                HTTP on 127.0.0.1:<port>                         │
//! │                              ▼                                  │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │               Tika server (Long-Running Child Process)          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use isotika::config::Settings;
//! use isotika::worker::{ProcessSupervisor, RequestGateway};
//!
//! let settings = Settings::load()?;
//! let mut supervisor = ProcessSupervisor::new(settings.worker, "tika-server-1.5.jar")?;
//! let gateway = RequestGateway::new(&settings.request)?;
//!
//! supervisor.start().await?;
//! let outcome = gateway.send(&mut supervisor, b"hello", Some("text/plain")).await?;
//! supervisor.stop().await;
//! ```

mod artifact;
mod drain;
mod error;
mod gateway;
mod port;
pub mod protocol;
mod supervisor;

pub use artifact::{candidate_paths, extract_artifact, is_embedded_available, resolve_artifact};
pub use drain::OutputDrain;
pub use error::{WorkerError, WorkerResult};
pub use gateway::RequestGateway;
pub use port::PortAllocator;
pub use protocol::RequestOutcome;
pub use supervisor::{LaunchCommand, ProcessSupervisor, WorkerState};
