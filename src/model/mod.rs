//! This module provides common objects used throughout the entire application

pub mod action;
pub mod error;
pub mod file_record;
pub mod state;
pub mod transfer_event;
pub mod upload_item;
pub mod upload_outcome;
pub mod upload_progress_item;
pub mod user;
