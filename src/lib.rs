pub mod archive;
pub mod config;
pub mod error;
pub mod filename;
pub mod pipeline;
pub mod query;
pub mod signal;
pub mod table;

pub use crate::error::ExpdataError;
pub use crate::filename::{FilenameParser, SessionRecord, Side};
pub use crate::pipeline::{LoadOptions, MergeStrategy, load, load_raw};
pub use crate::query::{DecoderRegistry, MemberFormat, MemberQueryLoader, PathQuery};
pub use crate::signal::ArraySignal;
pub use crate::table::{Dataset, Metadata, Payload, PayloadKind, Record, Table, Value};
