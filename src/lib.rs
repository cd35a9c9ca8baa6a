// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod clients;
pub mod config;
pub mod deadline;
pub mod dedup;
pub mod error;
pub mod fanout;
pub mod jobs;
pub mod metrics;
pub mod normalize;
pub mod quota;
pub mod rate_limit;
pub mod regen;
pub mod retry;

// ---- Re-exports for stable public API ----
pub use crate::error::{ErrorEntry, JobError};
pub use crate::jobs::news::{NewsJob, NewsJobConfig, NewsPayload};
pub use crate::jobs::terms::{TermsJob, TermsJobConfig};
pub use crate::jobs::JobResult;
