use std::fmt;
use std::fs;
use std::io::Read;

use camino::Utf8Path;
use zip::ZipArchive;

use crate::error::ExpdataError;
use crate::table::{Payload, Record, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberFormat {
    Json,
    Yaml,
}

impl MemberFormat {
    pub fn infer(member: &str) -> Result<Self, ExpdataError> {
        if member.ends_with(".json") {
            Ok(MemberFormat::Json)
        } else if member.ends_with(".yaml") || member.ends_with(".preferences") {
            Ok(MemberFormat::Yaml)
        } else {
            Err(ExpdataError::UnsupportedFormat(member.to_string()))
        }
    }
}

impl fmt::Display for MemberFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberFormat::Json => write!(f, "json"),
            MemberFormat::Yaml => write!(f, "yaml"),
        }
    }
}

pub type DecodeFn = fn(member: &str, bytes: &[u8]) -> Result<serde_json::Value, ExpdataError>;

fn decode_json(member: &str, bytes: &[u8]) -> Result<serde_json::Value, ExpdataError> {
    serde_json::from_slice(bytes).map_err(|err| ExpdataError::MemberDecode {
        member: member.to_string(),
        reason: err.to_string(),
    })
}

fn decode_yaml(member: &str, bytes: &[u8]) -> Result<serde_json::Value, ExpdataError> {
    let value: serde_yaml::Value =
        serde_yaml::from_slice(bytes).map_err(|err| ExpdataError::MemberDecode {
            member: member.to_string(),
            reason: err.to_string(),
        })?;
    serde_json::to_value(value).map_err(|err| ExpdataError::MemberDecode {
        member: member.to_string(),
        reason: err.to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct DecoderRegistry {
    decoders: Vec<(MemberFormat, DecodeFn)>,
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self {
            decoders: vec![
                (MemberFormat::Json, decode_json),
                (MemberFormat::Yaml, decode_yaml),
            ],
        }
    }
}

impl DecoderRegistry {
    pub fn empty() -> Self {
        Self {
            decoders: Vec::new(),
        }
    }

    pub fn register(&mut self, format: MemberFormat, decode: DecodeFn) {
        self.decoders.push((format, decode));
    }

    fn decode(
        &self,
        format: MemberFormat,
        member: &str,
        bytes: &[u8],
    ) -> Result<serde_json::Value, ExpdataError> {
        let decode = self
            .decoders
            .iter()
            .rev()
            .find(|(registered, _)| *registered == format)
            .map(|(_, decode)| decode)
            .ok_or_else(|| ExpdataError::UnsupportedFormat(member.to_string()))?;
        decode(member, bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathQuery {
    segments: Vec<Segment>,
}

impl PathQuery {
    pub fn compile(name: &str, query: &str) -> Result<Self, ExpdataError> {
        if query.trim().is_empty() {
            return Err(ExpdataError::QueryCompile {
                name: name.to_string(),
                reason: "query is empty".to_string(),
            });
        }
        let mut segments = Vec::new();
        for raw in query.split('.') {
            if raw.is_empty() {
                return Err(ExpdataError::QueryCompile {
                    name: name.to_string(),
                    reason: format!("empty path segment in '{query}'"),
                });
            }
            if raw.chars().all(|ch| ch.is_ascii_digit()) {
                segments.push(Segment::Index(raw.parse().map_err(|_| {
                    ExpdataError::QueryCompile {
                        name: name.to_string(),
                        reason: format!("index segment out of range in '{query}'"),
                    }
                })?));
            } else {
                segments.push(Segment::Key(raw.to_string()));
            }
        }
        Ok(Self { segments })
    }

    pub fn search<'a>(&self, value: &'a serde_json::Value) -> Option<&'a serde_json::Value> {
        let mut current = value;
        for segment in &self.segments {
            current = match segment {
                Segment::Key(key) => current.get(key.as_str())?,
                Segment::Index(at) => current.get(*at)?,
            };
        }
        Some(current)
    }
}

#[derive(Debug)]
pub struct MemberQueryLoader {
    member: String,
    format: MemberFormat,
    queries: Vec<(String, PathQuery)>,
    registry: DecoderRegistry,
}

impl MemberQueryLoader {
    pub fn new<N, Q>(member: impl Into<String>, queries: &[(N, Q)]) -> Result<Self, ExpdataError>
    where
        N: AsRef<str>,
        Q: AsRef<str>,
    {
        let member = member.into();
        let format = MemberFormat::infer(&member)?;
        Self::with_format(member, queries, format)
    }

    pub fn with_format<N, Q>(
        member: impl Into<String>,
        queries: &[(N, Q)],
        format: MemberFormat,
    ) -> Result<Self, ExpdataError>
    where
        N: AsRef<str>,
        Q: AsRef<str>,
    {
        let compiled = queries
            .iter()
            .map(|(name, query)| {
                PathQuery::compile(name.as_ref(), query.as_ref())
                    .map(|compiled| (name.as_ref().to_string(), compiled))
            })
            .collect::<Result<Vec<_>, ExpdataError>>()?;

        Ok(Self {
            member: member.into(),
            format,
            queries: compiled,
            registry: DecoderRegistry::default(),
        })
    }

    pub fn with_registry(mut self, registry: DecoderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn format(&self) -> MemberFormat {
        self.format
    }

    pub fn load(&self, archive: &Utf8Path) -> Result<Record, ExpdataError> {
        let file = fs::File::open(archive.as_std_path()).map_err(|err| {
            ExpdataError::Filesystem(format!("open archive {archive}: {err}"))
        })?;
        let mut bundle =
            ZipArchive::new(file).map_err(|err| ExpdataError::Archive(err.to_string()))?;
        let mut bytes = Vec::new();
        {
            let mut entry = bundle
                .by_name(&self.member)
                .map_err(|err| ExpdataError::Archive(err.to_string()))?;
            entry
                .read_to_end(&mut bytes)
                .map_err(|err| ExpdataError::Filesystem(err.to_string()))?;
        }

        let decoded = self.registry.decode(self.format, &self.member, &bytes)?;
        let mut record = Record::new();
        for (name, query) in &self.queries {
            let value = query
                .search(&decoded)
                .map(Value::from_json)
                .unwrap_or(Value::Null);
            record.push(name.clone(), value);
        }
        Ok(record)
    }

    pub fn payload_loader(&self) -> impl Fn(&Utf8Path) -> Result<Payload, ExpdataError> + '_ {
        move |path: &Utf8Path| self.load(path).map(Payload::Record)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn infer_member_formats() {
        assert_eq!(MemberFormat::infer("io.json").unwrap(), MemberFormat::Json);
        assert_eq!(
            MemberFormat::infer("settings.yaml").unwrap(),
            MemberFormat::Yaml
        );
        assert_eq!(
            MemberFormat::infer("final.preferences").unwrap(),
            MemberFormat::Yaml
        );
        let err = MemberFormat::infer("recording.bin").unwrap_err();
        assert_matches!(err, ExpdataError::UnsupportedFormat(_));
    }

    #[test]
    fn compile_rejects_malformed_queries() {
        let err = PathQuery::compile("ch", "").unwrap_err();
        assert_matches!(err, ExpdataError::QueryCompile { .. });

        let err = PathQuery::compile("ch", "output..channel").unwrap_err();
        assert_matches!(err, ExpdataError::QueryCompile { .. });
    }

    #[test]
    fn search_nested_and_missing() {
        let value = serde_json::json!({"output": {"ch": {"channel": 3}}});
        let query = PathQuery::compile("channel", "output.ch.channel").unwrap();
        assert_eq!(query.search(&value), Some(&serde_json::json!(3)));

        let missing = PathQuery::compile("gain", "output.ch.gain").unwrap();
        assert_eq!(missing.search(&value), None);
    }

    #[test]
    fn search_array_index() {
        let value = serde_json::json!({"channels": [10, 20, 30]});
        let query = PathQuery::compile("second", "channels.1").unwrap();
        assert_eq!(query.search(&value), Some(&serde_json::json!(20)));
    }

    #[test]
    fn empty_registry_has_no_decoder() {
        let registry = DecoderRegistry::empty();
        let err = registry
            .decode(MemberFormat::Json, "io.json", b"{}")
            .unwrap_err();
        assert_matches!(err, ExpdataError::UnsupportedFormat(_));
    }
}
