//! Upload tracking, dashboard state and the HTTP boundary to the Volt services

pub mod api_client;
pub mod batch_debouncer;
pub mod dashboard;
pub mod task_registry;
pub mod transfer_channel;
pub mod upload_tracker;
