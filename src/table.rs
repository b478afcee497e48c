use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::ExpdataError;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Null,
}

impl Value {
    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(flag) => Value::Bool(*flag),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(integer) => Value::Integer(integer),
                None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(text) => Value::String(text.clone()),
            nested => Value::String(nested.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(integer) => Some(*integer as f64),
            Value::Float(float) => Some(*float),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(text) => write!(f, "{text}"),
            Value::Integer(integer) => write!(f, "{integer}"),
            Value::Float(float) => write!(f, "{float}"),
            Value::Bool(flag) => write!(f, "{flag}"),
            Value::DateTime(value) => write!(f, "{value}"),
            Value::Date(value) => write!(f, "{value}"),
            Value::Time(value) => write!(f, "{value}"),
            Value::Null => write!(f, "<null>"),
        }
    }
}

pub type Metadata = Vec<(String, Value)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Table,
    Record,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadKind::Table => write!(f, "table"),
            PayloadKind::Record => write!(f, "record"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.fields.push((name.into(), value));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(field, _)| field == name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Metadata> for Record {
    fn from(fields: Metadata) -> Self {
        Self { fields }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub index_names: Vec<String>,
    pub index: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            index_names: Vec::new(),
            index: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), ExpdataError> {
        if row.len() != self.columns.len() {
            return Err(ExpdataError::TableShape(format!(
                "row has {} values but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        if !self.index_names.is_empty() {
            return Err(ExpdataError::TableShape(
                "indexed table requires push_indexed_row".to_string(),
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn push_indexed_row(&mut self, key: Vec<Value>, row: Vec<Value>) -> Result<(), ExpdataError> {
        if row.len() != self.columns.len() {
            return Err(ExpdataError::TableShape(format!(
                "row has {} values but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        if key.len() != self.index_names.len() {
            return Err(ExpdataError::TableShape(format!(
                "index key has {} values but table has {} index levels",
                key.len(),
                self.index_names.len()
            )));
        }
        self.rows.push(row);
        self.index.push(key);
        Ok(())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column == name)
    }

    pub fn add_constant_column(&mut self, name: impl Into<String>, value: Value) {
        self.columns.push(name.into());
        for row in &mut self.rows {
            row.push(value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Table(Table),
    Record(Record),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Table(_) => PayloadKind::Table,
            Payload::Record(_) => PayloadKind::Record,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub index_names: Vec<String>,
    pub index: Vec<Vec<Value>>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn concat(parts: Vec<Table>) -> Dataset {
        let mut columns: Vec<String> = Vec::new();
        let mut index_names: Vec<String> = Vec::new();
        for part in &parts {
            for name in &part.columns {
                if !columns.contains(name) {
                    columns.push(name.clone());
                }
            }
            for name in &part.index_names {
                if !index_names.contains(name) {
                    index_names.push(name.clone());
                }
            }
        }

        let mut rows = Vec::new();
        let mut index = Vec::new();
        for part in parts {
            let column_map: Vec<Option<usize>> = columns
                .iter()
                .map(|name| part.columns.iter().position(|column| column == name))
                .collect();
            let index_map: Vec<Option<usize>> = index_names
                .iter()
                .map(|name| part.index_names.iter().position(|level| level == name))
                .collect();
            for (position, row) in part.rows.iter().enumerate() {
                rows.push(
                    column_map
                        .iter()
                        .map(|slot| slot.map(|at| row[at].clone()).unwrap_or(Value::Null))
                        .collect(),
                );
                if !index_names.is_empty() {
                    let key = part.index.get(position);
                    index.push(
                        index_map
                            .iter()
                            .map(|slot| match (slot, key) {
                                (Some(at), Some(key)) => {
                                    key.get(*at).cloned().unwrap_or(Value::Null)
                                }
                                _ => Value::Null,
                            })
                            .collect(),
                    );
                }
            }
        }

        Dataset {
            index_names,
            index,
            columns,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let at = self.columns.iter().position(|column| column == name)?;
        Some(self.rows.iter().map(|row| &row[at]).collect())
    }

    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        let at = self.columns.iter().position(|column| column == name)?;
        self.rows.get(row)?.get(at)
    }
}
