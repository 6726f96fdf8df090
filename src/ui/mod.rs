//! TUI components.

pub mod app;
pub mod render;

pub use app::{App, EndpointRow, ViewMode};
pub use render::render;
