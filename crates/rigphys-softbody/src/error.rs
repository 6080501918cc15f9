use rigphys_core::NodeId;
use thiserror::Error;

/// Fatal build failures. Dangling references merely skip a declaration
/// (see `MessageLog`); these abort the build.
#[derive(Debug, Error)]
pub enum SoftbodyError {
    #[error("{kind} arena capacity exceeded (capacity {capacity})")]
    CapacityExceeded { kind: &'static str, capacity: usize },

    #[error("beam endpoints must differ (both ends at {0})")]
    DegenerateBeam(NodeId),
}
