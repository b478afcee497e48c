use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::error::ExpdataError;
use crate::table::{Dataset, Metadata, Payload, PayloadKind, Record, Table, Value};

pub const EXCLUDE_MARKER: &str = "_exclude";
pub const CACHE_MARKER: &str = ".imaris_cache";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    #[default]
    Columns,
    Index,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub kind: PayloadKind,
    pub strategy: MergeStrategy,
    pub include_dataset: bool,
}

impl LoadOptions {
    pub fn table() -> Self {
        Self {
            kind: PayloadKind::Table,
            strategy: MergeStrategy::default(),
            include_dataset: false,
        }
    }

    pub fn record() -> Self {
        Self {
            kind: PayloadKind::Record,
            strategy: MergeStrategy::default(),
            include_dataset: false,
        }
    }

    pub fn with_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_dataset_field(mut self) -> Self {
        self.include_dataset = true;
        self
    }
}

pub fn load<L, P>(
    root: &Utf8Path,
    pattern: &str,
    loader: L,
    metadata_parser: P,
    should_load: Option<&dyn Fn(&Utf8Path) -> bool>,
    options: &LoadOptions,
) -> Result<Dataset, ExpdataError>
where
    L: Fn(&Utf8Path) -> Result<Payload, ExpdataError>,
    P: Fn(&Utf8Path) -> Result<Metadata, ExpdataError>,
{
    let full_pattern = root.join(pattern);
    let matches = glob::glob(full_pattern.as_str())
        .map_err(|err| ExpdataError::InvalidPattern(err.to_string()))?;

    let mut merged = Vec::new();
    for entry in matches {
        let path = entry.map_err(|err| ExpdataError::Filesystem(err.to_string()))?;
        let path = Utf8PathBuf::from_path_buf(path).map_err(|path| {
            ExpdataError::Filesystem(format!("non-utf8 path {}", path.display()))
        })?;
        if path.as_str().contains(EXCLUDE_MARKER) || path.as_str().contains(CACHE_MARKER) {
            debug!(path = %path, "skipping reserved path");
            continue;
        }
        if let Some(predicate) = should_load {
            if !predicate(&path) {
                debug!(path = %path, "skipping filtered path");
                continue;
            }
        }
        let record =
            process_file(&path, &loader, &metadata_parser, options).map_err(|err| {
                ExpdataError::FileProcessing {
                    path: path.clone(),
                    source: Box::new(err),
                }
            })?;
        merged.push(record);
    }

    if merged.is_empty() {
        return Err(ExpdataError::EmptyResult);
    }
    Ok(Dataset::concat(merged))
}

pub fn load_raw<L, P>(
    root: &Utf8Path,
    category: Option<&str>,
    loader: L,
    metadata_parser: P,
    should_load: Option<&dyn Fn(&Utf8Path) -> bool>,
    options: &LoadOptions,
) -> Result<Dataset, ExpdataError>
where
    L: Fn(&Utf8Path) -> Result<Payload, ExpdataError>,
    P: Fn(&Utf8Path) -> Result<Metadata, ExpdataError>,
{
    let pattern = match category {
        Some(category) => format!("**/*{category}*.zip"),
        None => "**/*.zip".to_string(),
    };
    load(root, &pattern, loader, metadata_parser, should_load, options)
}

fn process_file<L, P>(
    path: &Utf8Path,
    loader: &L,
    metadata_parser: &P,
    options: &LoadOptions,
) -> Result<Table, ExpdataError>
where
    L: Fn(&Utf8Path) -> Result<Payload, ExpdataError>,
    P: Fn(&Utf8Path) -> Result<Metadata, ExpdataError>,
{
    let payload = loader(path)?;
    if payload.kind() != options.kind {
        return Err(ExpdataError::PayloadShape {
            expected: options.kind,
            found: payload.kind(),
        });
    }
    let mut fields = metadata_parser(path)?;
    if options.include_dataset {
        let dataset = path
            .parent()
            .and_then(Utf8Path::file_name)
            .unwrap_or_default()
            .to_string();
        fields.push(("dataset".to_string(), Value::String(dataset)));
    }
    match options.strategy {
        MergeStrategy::Columns => merge_columns(payload, fields),
        MergeStrategy::Index => merge_index(payload, fields),
    }
}

fn merge_columns(payload: Payload, fields: Metadata) -> Result<Table, ExpdataError> {
    match payload {
        Payload::Table(mut table) => {
            for (name, _) in &fields {
                if table.has_column(name) {
                    return Err(ExpdataError::ColumnCollision(name.clone()));
                }
            }
            for (name, value) in fields {
                table.add_constant_column(name, value);
            }
            Ok(table)
        }
        Payload::Record(mut record) => {
            for (name, _) in &fields {
                if record.contains(name) {
                    return Err(ExpdataError::ColumnCollision(name.clone()));
                }
            }
            for (name, value) in fields {
                record.push(name, value);
            }
            Ok(record_to_table(record, Vec::new(), Vec::new()))
        }
    }
}

fn merge_index(payload: Payload, fields: Metadata) -> Result<Table, ExpdataError> {
    let (names, key): (Vec<String>, Vec<Value>) = fields.into_iter().unzip();
    match payload {
        Payload::Table(mut table) => {
            let existing_names = std::mem::take(&mut table.index_names);
            let existing_index = std::mem::take(&mut table.index);

            let mut index_names = names;
            index_names.extend(existing_names);

            let mut index = Vec::with_capacity(table.rows.len());
            for at in 0..table.rows.len() {
                let mut tuple = key.clone();
                if let Some(existing) = existing_index.get(at) {
                    tuple.extend(existing.iter().cloned());
                }
                index.push(tuple);
            }

            table.index_names = index_names;
            table.index = index;
            Ok(table)
        }
        Payload::Record(record) => Ok(record_to_table(record, names, key)),
    }
}

fn record_to_table(record: Record, index_names: Vec<String>, key: Vec<Value>) -> Table {
    let (columns, row): (Vec<String>, Vec<Value>) = record.fields.into_iter().unzip();
    let mut table = Table::new(columns);
    table.rows.push(row);
    if !index_names.is_empty() {
        table.index_names = index_names;
        table.index.push(key);
    }
    table
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn fields() -> Metadata {
        vec![
            (
                "experimenter".to_string(),
                Value::String("alice".to_string()),
            ),
            ("animal_id".to_string(), Value::String("m1".to_string())),
        ]
    }

    #[test]
    fn merge_columns_broadcasts_metadata() {
        let mut table = Table::new(vec!["level".to_string()]);
        table.push_row(vec![Value::Integer(10)]).unwrap();
        table.push_row(vec![Value::Integer(20)]).unwrap();

        let merged = merge_columns(Payload::Table(table), fields()).unwrap();
        assert_eq!(merged.columns, vec!["level", "experimenter", "animal_id"]);
        assert_eq!(merged.rows[1][1], Value::String("alice".to_string()));
    }

    #[test]
    fn merge_columns_detects_collision_before_mutating() {
        let mut table = Table::new(vec!["animal_id".to_string()]);
        table
            .push_row(vec![Value::String("payload".to_string())])
            .unwrap();

        let err = merge_columns(Payload::Table(table), fields()).unwrap_err();
        assert_matches!(err, ExpdataError::ColumnCollision(name) if name == "animal_id");
    }

    #[test]
    fn merge_index_prefixes_metadata_levels() {
        let mut table = Table::new(vec!["level".to_string()]);
        table.index_names = vec!["rep".to_string()];
        table
            .push_indexed_row(vec![Value::Integer(0)], vec![Value::Integer(10)])
            .unwrap();

        let merged = merge_index(Payload::Table(table), fields()).unwrap();
        assert_eq!(merged.columns, vec!["level"]);
        assert_eq!(merged.index_names, vec!["experimenter", "animal_id", "rep"]);
        assert_eq!(
            merged.index[0],
            vec![
                Value::String("alice".to_string()),
                Value::String("m1".to_string()),
                Value::Integer(0)
            ]
        );
    }

    #[test]
    fn merge_index_turns_record_into_keyed_row() {
        let mut record = Record::new();
        record.push("gain", Value::Integer(4));

        let merged = merge_index(Payload::Record(record), fields()).unwrap();
        assert_eq!(merged.columns, vec!["gain"]);
        assert_eq!(merged.index_names, vec!["experimenter", "animal_id"]);
        assert_eq!(merged.rows.len(), 1);
    }
}
