//! # Volt TUI Library
//!
//! Core of the Volt terminal client: the concurrent upload tracker with its
//! debounced hand-off to the dashboard, the dashboard state itself, and the
//! HTTP client for the Volt auth and file services.
//!
//! The library is used by the `volt-tui` binary and by the integration tests.

#![forbid(unsafe_code)]

pub mod model;
pub mod services;
pub mod settings;
pub mod utils;
