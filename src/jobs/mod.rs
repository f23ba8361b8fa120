//! Background generation jobs.
//!
//! Plan generation runs on the backend and can take minutes. The
//! [`JobTracker`] keeps a registry of running jobs and polls them on an
//! interval that outlives any screen. The [`JobLauncher`] starts jobs and
//! enforces that only one generation runs at a time.

mod error;
mod launcher;
mod tracker;

pub use error::JobError;
pub use launcher::JobLauncher;
pub use tracker::{JobEvent, JobFailure, JobTracker, PollSummary};
