//! Persisted session and user configurable settings

pub mod app_config;
pub mod session;
