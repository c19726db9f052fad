pub mod app_ref;
pub mod build;
pub mod build_outcome;
pub mod config;
pub mod retry;
pub mod storage;

pub use app_ref::AppRef;
pub use build::{BuildJob, BuildReport};
pub use build_outcome::BuildOutcome;
