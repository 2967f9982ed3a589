use thiserror::Error;

/// Terminal failure of one fill run. Every variant aborts the run; no error
/// is retried above the collaborator-call layer.
#[derive(Debug, Error)]
pub enum FillError {
    /// The document archive could not be opened, or the primary content
    /// entry is missing. Raised before any model call is made.
    #[error("malformed document package: {0:#}")]
    MalformedPackage(anyhow::Error),

    /// The primary content entry is not well-formed XML.
    #[error("malformed document content: {0:#}")]
    MalformedContent(anyhow::Error),

    /// The detection call exhausted its retry budget or returned output that
    /// is not the expected JSON shape at all.
    #[error("slot detection failed: {0:#}")]
    DetectionFailed(anyhow::Error),

    /// The resolution call exhausted its retry budget or returned output
    /// that is not the expected JSON shape at all.
    #[error("slot resolution failed: {0:#}")]
    ResolutionFailed(anyhow::Error),

    /// The resolver returned no resolution for one or more known slot ids.
    /// A collaborator contract violation, distinct from a transport failure.
    #[error("resolver dropped slots (protocol mismatch): {}", missing.join(", "))]
    ResolutionIncomplete { missing: Vec<String> },

    /// Post-resolution structural failure: the primary entry could not be
    /// decoded, the patched XML is no longer well-formed, or re-archiving
    /// failed.
    #[error("failed to patch document: {0:#}")]
    PatchFailed(anyhow::Error),

    /// Remote mode: the event stream ended without a successful terminal
    /// payload. Individual malformed lines are tolerated; this is not.
    #[error("remote stream ended without a complete result")]
    RemoteIncomplete,

    /// Remote mode: the upload or stream read failed at the transport level.
    #[error("remote transport error: {0:#}")]
    Transport(anyhow::Error),
}
