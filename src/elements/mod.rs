//! Content elements extracted from pages.

mod text;

pub use text::{compute_run_id, text_box, Color, TextRun};
