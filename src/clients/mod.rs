// src/clients/mod.rs
pub mod memory;
pub mod news;
pub mod openai;

use crate::error::JobError;

/// Map a reqwest transport failure onto the job error taxonomy.
pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> JobError {
    JobError::network(format!("{provider}: {err}"))
}

/// Parse a `Retry-After` header value (whole or fractional seconds).
pub(crate) fn retry_after_secs(resp: &reqwest::Response) -> Option<f64> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
}
