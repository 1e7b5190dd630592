//! CLI command handlers, one file per command group.

mod catalog;
mod download;
mod generate;
mod status;

pub use catalog::{run_catalog, run_logo};
pub use download::run_download;
pub use generate::{run_analyze, run_image, run_speech, run_video};
pub use status::{run_resume, run_status};
