use crate::trial::TrialKind;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TmtError {
    #[error("could not load point data from {reference}: {source}")]
    ResourceLoad {
        reference: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed point record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("invalid point set: {reason}")]
    InvalidPointSet { reason: String },

    #[error("participant id is missing")]
    MissingParticipantId,

    #[error("result for {0:?} already recorded")]
    SlotAlreadyRecorded(TrialKind),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("could not write export file {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store error: {0}")]
    Store(String),
}
