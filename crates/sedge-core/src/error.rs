//! Error types for record storage and the registrar's client surface.

use snafu::Snafu;

/// Result type for client-surface registrar operations.
pub type RegistrarResult<T, E = RegistrarError> = std::result::Result<T, E>;

/// Errors at the backing-store boundary.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AorStoreError {
    /// Another writer won the compare-and-swap race.
    #[snafu(display("write contention on '{key}'"))]
    Contention {
        /// Record key being written.
        key: String,
    },

    /// Transport or backend failure; the outcome of the operation is
    /// indeterminate.
    #[snafu(display("backing store failure on '{key}': {reason}"))]
    Backend {
        /// Record key being accessed.
        key: String,
        /// Description of the underlying failure.
        reason: String,
    },

    /// The stored bytes did not decode to a structurally valid record.
    /// Callers treat this like a backend failure; it is logged separately.
    #[snafu(display("stored record for '{key}' is malformed: {source}"))]
    Malformed {
        /// Record key that failed to decode.
        key: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

impl AorStoreError {
    /// Whether this error is a compare-and-swap conflict that a
    /// read-modify-write loop may retry.
    pub fn is_contention(&self) -> bool {
        matches!(self, AorStoreError::Contention { .. })
    }
}

/// Errors surfaced to registrar clients. Everything else - contention,
/// sibling failures, broker failures - is recovered or suppressed
/// internally.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RegistrarError {
    /// No usable record for the subscriber. A stored record with no
    /// bindings counts as absent.
    #[snafu(display("no record for '{aor_id}'"))]
    NotFound {
        /// Subscriber id.
        aor_id: String,
    },

    /// The supplied version no longer matches the stored record.
    #[snafu(display("version mismatch for '{aor_id}'"))]
    VersionMismatch {
        /// Subscriber id.
        aor_id: String,
    },

    /// A create was attempted for a subscriber that already has a record.
    #[snafu(display("record already exists for '{aor_id}'"))]
    AlreadyExists {
        /// Subscriber id.
        aor_id: String,
    },

    /// The backing store failed.
    #[snafu(display("store operation failed for '{aor_id}': {source}"))]
    Store {
        /// Subscriber id.
        aor_id: String,
        /// Underlying store error.
        source: AorStoreError,
    },

    /// A contended write loop ran out of retry budget.
    #[snafu(display("retries exhausted for '{aor_id}' after {attempts} attempts"))]
    RetriesExhausted {
        /// Subscriber id.
        aor_id: String,
        /// Number of attempts made.
        attempts: u32,
    },
}

/// Errors from the external timer broker. These never fail a client
/// operation; the caller logs and continues.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TimerServiceError {
    /// The request could not be sent or the response could not be read.
    #[snafu(display("timer broker request failed: {reason}"))]
    Request {
        /// Description of the failure.
        reason: String,
    },

    /// The broker answered with a non-success status.
    #[snafu(display("timer broker returned status {status}"))]
    Status {
        /// HTTP status code returned.
        status: u16,
    },
}
