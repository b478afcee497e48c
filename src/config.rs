use std::fs;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::ExpdataError;
use crate::filename::FilenameParser;
use crate::query::MemberQueryLoader;

#[derive(Debug, Deserialize, Serialize)]
pub struct Profile {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub include_side: bool,
    #[serde(default)]
    pub member: Option<String>,
    #[serde(default)]
    pub queries: Vec<QueryEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum QueryEntry {
    Shorthand(String),
    Detailed(QueryEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct QueryEntryObject {
    pub name: String,
    pub query: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedProfile {
    pub schema_version: u32,
    pub categories: Vec<String>,
    pub include_side: bool,
    pub member: Option<String>,
    pub queries: Vec<(String, String)>,
}

pub struct ProfileLoader;

impl ProfileLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedProfile, ExpdataError> {
        let profile_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => Utf8PathBuf::from("expdata.json"),
        };

        if path.is_none() && !profile_path.as_std_path().exists() {
            return Err(ExpdataError::MissingProfile);
        }

        let content = fs::read_to_string(profile_path.as_std_path())
            .map_err(|_| ExpdataError::ProfileRead(profile_path.clone()))?;
        let profile: Profile = serde_json::from_str(&content)
            .map_err(|err| ExpdataError::ProfileParse(err.to_string()))?;

        Self::resolve_profile(profile)
    }

    pub fn resolve_profile(profile: Profile) -> Result<ResolvedProfile, ExpdataError> {
        let schema_version = profile.schema_version.unwrap_or(1);
        if profile.categories.is_empty() {
            return Err(ExpdataError::InvalidCategories(
                "profile lists no categories".to_string(),
            ));
        }

        let queries = profile
            .queries
            .into_iter()
            .map(|entry| match entry {
                QueryEntry::Shorthand(query) => {
                    let name = query.rsplit('.').next().unwrap_or(&query).to_string();
                    (name, query)
                }
                QueryEntry::Detailed(obj) => (obj.name, obj.query),
            })
            .collect();

        Ok(ResolvedProfile {
            schema_version,
            categories: profile.categories,
            include_side: profile.include_side,
            member: profile.member,
            queries,
        })
    }
}

impl ResolvedProfile {
    pub fn filename_parser(&self) -> Result<FilenameParser, ExpdataError> {
        FilenameParser::new(&self.categories, self.include_side)
    }

    pub fn query_loader(&self) -> Result<Option<MemberQueryLoader>, ExpdataError> {
        let Some(member) = &self.member else {
            return Ok(None);
        };
        MemberQueryLoader::new(member.clone(), &self.queries).map(Some)
    }
}
