pub mod config;
pub mod configure;
pub mod merge;
pub mod models;
pub mod report;
pub mod workspace;

pub use configure::{ConfigureRequest, configure_jobs};
pub use workspace::Workspace;
