use thiserror::Error;

/// A reader-level failure: malformed input, an archive shape the reader
/// does not support, or a cursor that cannot be resolved.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("malformed record in {file} at record {record_index}: {reason}")]
    Malformed {
        file: String,
        record_index: u64,
        reason: String,
    },
    #[error("unsupported archive '{0}': only .jsonl, .jsonl.gz, and single-entry .jsonl.zip are supported")]
    UnsupportedArchive(String),
    #[error("archive '{0}' contains more than one entry; multi-entry archives are rejected")]
    MultiEntryArchive(String),
    #[error("non-monotonic timestamp in {file}: record {record_index} has ts {ts} < previous ts {previous_ts}")]
    NonMonotonic {
        file: String,
        record_index: u64,
        ts: i64,
        previous_ts: i64,
    },
    #[error("start cursor names file '{0}' which is not among the provided inputs")]
    CursorNotFound(String),
    #[error("I/O error reading {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

/// A checkpoint file failed structural validation, or referenced state
/// that cannot be reconciled.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("unsupported checkpoint version {0}, expected 1")]
    UnsupportedVersion(u64),
    #[error("checkpoint schema violation: {0}")]
    SchemaViolation(String),
    #[error("checkpoint references order id '{0}' which is not present in state.orders")]
    MissingOrderId(String),
    #[error("I/O error accessing checkpoint: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed checkpoint JSON: {0}")]
    Json(#[from] serde_json::Error),
}
