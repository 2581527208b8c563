#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("entity store failure")]
    Sled(#[from] sled::Error),
    #[error("failed to encode entity {kind}: {reason}")]
    Encode { kind: &'static str, reason: String },
    #[error("failed to decode entity {kind}: {reason}")]
    Decode { kind: &'static str, reason: String },
}

/// Per-event failure taxonomy. Nothing here retries; the delivery collaborator
/// owns redelivery policy.
#[derive(thiserror::Error, Debug)]
pub enum EventError {
    /// A required external read failed with no fallback variant available.
    /// The containing event is abandoned with no partial mutation.
    #[error("unresolvable reference: {0}")]
    Unresolvable(String),
    /// Decoded input matched no known historical calling convention.
    #[error("unrecognized event shape: {0}")]
    UnrecognizedShape(String),
    /// An update event referenced an entity that was never created.
    #[error("missing prerequisite entity {kind} with id {id}")]
    MissingPrerequisite { kind: &'static str, id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}
