//! TUI pages and widgets

pub mod app_router;
pub mod component;
pub mod dashboard_page;
pub mod help_page;
pub mod widgets;
