//! Output layer - colors and response formatting for the terminal

pub mod color;
pub mod format;

pub use color::{method_color, status_color, Colorizer};
pub use format::{is_json_content_type, request_body, request_head, ResponseFormatter};
