use std::io;

use thiserror::Error;

use crate::{AgentId, SegmentId};

/// Errors produced while decoding binary trace or partition data.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A trace record carried a type code with no registered decoder.
    #[error("unknown event type code 0x{0:02x}")]
    UnknownEventType(u8),
    /// A position payload carried an unknown kind byte.
    #[error("unknown vector type code 0x{0:02x}")]
    UnknownVectorType(u8),
    /// A query payload carried an unknown query type.
    #[error("unknown query type code 0x{0:02x}")]
    UnknownQueryType(u8),
    /// A record referenced a segment that is not in the road network.
    #[error("record references unknown segment {0}")]
    UnknownSegment(SegmentId),
    /// The stream ended in the middle of a record.
    #[error("truncated record at end of stream")]
    TruncatedRecord,
    /// A partition table disagreed with the junction set derived from
    /// its own segment list.
    #[error("partition table stores {stored} junctions, segment list implies {derived}")]
    MatrixSizeMismatch { stored: usize, derived: usize },
    /// A partition distance table held a negative distance.
    #[error("negative distance in partition table")]
    NegativeDistance,
    /// A stored path referenced a local segment index outside the partition.
    #[error("path leg references local segment index {0} out of range")]
    InvalidPathLeg(i32),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors surfaced by the simulation kernel and its activities.
#[derive(Debug, Error)]
pub enum SimError {
    /// Two loadable event types were registered under the same type code.
    #[error("duplicate event type code 0x{0:02x}")]
    DuplicateTypeCode(u8),
    /// A trace event referenced an agent missing from the registry.
    #[error("trace references unknown agent {0}")]
    UnknownAgent(AgentId),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Io(#[from] io::Error),
}
