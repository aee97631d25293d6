//! # isotika
//!
//! Metadata extraction through a process-isolated Tika server.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    IsolatedTika                          │
//! │        parse_file / parse_bytes / parse_reader           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [gateway]
//! ┌─────────────────────────────────────────────────────────┐
//! │                  RequestGateway                          │
//! │    bounded-time PUT /meta, restart on timeout            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [supervisor]
//! ┌─────────────────────────────────────────────────────────┐
//! │                ProcessSupervisor                         │
//! │   PortAllocator + OutputDrain + readiness polling        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │              java -jar tika-server.jar                   │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod config;
pub mod logging;
pub mod metadata;
pub mod worker;

pub use client::IsolatedTika;
pub use config::Settings;
pub use metadata::Metadata;
pub use worker::{WorkerError, WorkerResult};
