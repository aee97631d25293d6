//! Configuration module for isotika.
//!
//! Handles worker launch settings, request settings and environment variables.

mod settings;

pub use settings::{
    expand_env_vars, RequestSettings, Settings, SettingsError, WorkerSettings, PREFER_IPV4_FLAG,
};
