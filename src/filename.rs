use std::fmt;
use std::str::FromStr;

use camino::Utf8Path;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::error::ExpdataError;
use crate::table::{Metadata, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

impl FromStr for Side {
    type Err = ExpdataError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "left" => Ok(Side::Left),
            "right" => Ok(Side::Right),
            _ => Err(ExpdataError::FilenameFormat(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub datetime: NaiveDateTime,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub experimenter: String,
    pub animal_id: String,
    pub side: Option<Side>,
    pub note: Option<String>,
    pub experiment_type: String,
}

impl SessionRecord {
    pub fn into_fields(self) -> Metadata {
        let mut fields: Metadata = vec![
            ("datetime".to_string(), Value::DateTime(self.datetime)),
            ("experimenter".to_string(), Value::String(self.experimenter)),
            ("animal_id".to_string(), Value::String(self.animal_id)),
        ];
        if let Some(side) = self.side {
            fields.push(("side".to_string(), Value::String(side.to_string())));
        }
        if let Some(note) = self.note {
            fields.push(("note".to_string(), Value::String(note)));
        }
        fields.push((
            "experiment_type".to_string(),
            Value::String(self.experiment_type),
        ));
        fields.push(("date".to_string(), Value::Date(self.date)));
        fields.push(("time".to_string(), Value::Time(self.time)));
        fields
    }
}

#[derive(Debug, Clone)]
pub struct FilenameParser {
    pattern: Regex,
    include_side: bool,
}

impl FilenameParser {
    pub fn new<S: AsRef<str>>(categories: &[S], include_side: bool) -> Result<Self, ExpdataError> {
        if categories.is_empty() {
            return Err(ExpdataError::InvalidCategories(
                "at least one category label is required".to_string(),
            ));
        }
        let labels = categories
            .iter()
            .map(|label| regex::escape(label.as_ref()))
            .collect::<Vec<_>>()
            .join("|");
        // The category token anchors the match from the right so the greedy
        // note segment stays bounded.
        let pattern = Regex::new(&format!(
            r"^(?P<datetime>\d{{8}}-\d{{6}}) (?P<experimenter>\w+) (?P<animal_id>[-\w]+) ((?P<side>left|right) )?((?P<note>.*) )?(?P<experiment_type>(?:{labels})(_\w+)?).*$"
        ))
        .map_err(|err| ExpdataError::InvalidCategories(err.to_string()))?;

        Ok(Self {
            pattern,
            include_side,
        })
    }

    pub fn parse(&self, path: &Utf8Path) -> Result<SessionRecord, ExpdataError> {
        let stem = path
            .file_stem()
            .ok_or_else(|| ExpdataError::FilenameFormat(path.to_string()))?;
        let captures = self
            .pattern
            .captures(stem)
            .ok_or_else(|| ExpdataError::FilenameFormat(stem.to_string()))?;

        let datetime = NaiveDateTime::parse_from_str(&captures["datetime"], "%Y%m%d-%H%M%S")
            .map_err(|_| ExpdataError::FilenameFormat(stem.to_string()))?;
        let side = if self.include_side {
            captures
                .name("side")
                .map(|token| token.as_str().parse())
                .transpose()?
        } else {
            None
        };

        Ok(SessionRecord {
            datetime,
            date: datetime.date(),
            time: datetime.time(),
            experimenter: captures["experimenter"].to_string(),
            animal_id: captures["animal_id"].to_string(),
            side,
            note: captures.name("note").map(|token| token.as_str().to_string()),
            experiment_type: captures["experiment_type"].to_string(),
        })
    }

    pub fn metadata(&self, path: &Utf8Path) -> Result<Metadata, ExpdataError> {
        self.parse(path).map(SessionRecord::into_fields)
    }
}
