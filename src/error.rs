use camino::Utf8PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::table::PayloadKind;

#[derive(Debug, Error, Diagnostic)]
pub enum ExpdataError {
    #[error("could not parse filename: {0}")]
    FilenameFormat(String),

    #[error("invalid category vocabulary: {0}")]
    InvalidCategories(String),

    #[error("could not determine file format for {0}")]
    UnsupportedFormat(String),

    #[error("invalid query '{name}': {reason}")]
    QueryCompile { name: String, reason: String },

    #[error("metadata field '{0}' collides with an existing payload column")]
    ColumnCollision(String),

    #[error("payload shape mismatch: expected {expected}, found {found}")]
    PayloadShape {
        expected: PayloadKind,
        found: PayloadKind,
    },

    #[error("error processing {path}")]
    FileProcessing {
        path: Utf8PathBuf,
        #[source]
        source: Box<ExpdataError>,
    },

    #[error("no data found")]
    EmptyResult,

    #[error("invalid glob pattern: {0}")]
    InvalidPattern(String),

    #[error("{member} in archive {archive} is corrupted")]
    Integrity {
        archive: Utf8PathBuf,
        member: String,
    },

    #[error("digest sidecar mismatch for {0}")]
    SidecarMismatch(Utf8PathBuf),

    #[error("missing digest sidecar for {0}")]
    MissingSidecar(Utf8PathBuf),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("failed to decode member {member}: {reason}")]
    MemberDecode { member: String, reason: String },

    #[error("invalid signal data: {0}")]
    InvalidSignal(String),

    #[error("table shape error: {0}")]
    TableShape(String),

    #[error("missing profile file expdata.json in current directory")]
    MissingProfile,

    #[error("failed to read profile file at {0}")]
    ProfileRead(Utf8PathBuf),

    #[error("failed to parse JSON profile: {0}")]
    ProfileParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
