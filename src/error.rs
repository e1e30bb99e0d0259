//! Unified error handling for the exporter.
//!
//! Every failure during a scrape is scoped to the entity being processed
//! (a database, a collection, or an enumeration call) and never aborts the
//! enclosing scrape cycle.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while gathering statistics for one entity.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Listing databases or collections failed.
    #[error("failed to enumerate {0}: {1}")]
    Enumeration(String, #[source] mongodb::error::Error),

    /// A dbStats/collStats command failed or the connection was unavailable.
    #[error("stats command failed for {0}: {1}")]
    Query(String, #[source] mongodb::error::Error),

    /// The server replied, but the document did not decode.
    #[error("undecodable stats reply for {0}: {1}")]
    Decode(String, #[source] mongodb::bson::de::Error),

    /// A stats call exceeded the configured per-call deadline.
    #[error("stats call for {0} timed out after {1:?}")]
    Timeout(String, Duration),
}

impl ScrapeError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Enumeration(..) => "enumeration_failure",
            Self::Query(..) => "query_failure",
            Self::Decode(..) => "decode_failure",
            Self::Timeout(..) => "timeout",
        }
    }
}
