use std::fmt;
use std::str::FromStr;

use crate::error::ResolverError;

/// Rendered in place of a field that has no data (failed lookups).
pub const NO_DATA: &str = "None";

/// Rendered for a resolved entry whose gene field was empty.
pub const UNNAMED: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessionKey(String);

impl AccessionKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key with everything from the last `.` removed. Keys without a `.`
    /// (or whose stem would be empty) come back unchanged.
    pub fn strip_version(&self) -> AccessionKey {
        match self.0.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => AccessionKey(stem.to_string()),
            _ => self.clone(),
        }
    }
}

impl fmt::Display for AccessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccessionKey {
    type Err = ResolverError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        if normalized.is_empty() {
            return Err(ResolverError::InvalidAccession(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayName {
    Named(String),
    Unnamed,
}

impl DisplayName {
    /// Primary token of a whitespace-separated synonym list.
    pub fn from_gene_field(field: &str) -> Self {
        match field.split_whitespace().next() {
            Some(primary) => DisplayName::Named(primary.to_string()),
            None => DisplayName::Unnamed,
        }
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayName::Named(name) => write!(f, "{name}"),
            DisplayName::Unnamed => write!(f, "{UNNAMED}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Resolved {
        external_id: String,
        display_name: DisplayName,
    },
    Miss,
}

impl LookupOutcome {
    pub fn is_miss(&self) -> bool {
        matches!(self, LookupOutcome::Miss)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: AccessionKey,
    pub external_id: Option<String>,
    pub display_name: Option<DisplayName>,
}

impl Record {
    pub fn is_complete(&self) -> bool {
        self.external_id.is_some() && self.display_name.is_some()
    }

    /// `key,externalId,displayName` with sentinels substituted.
    pub fn to_csv_line(&self) -> String {
        let external_id = self.external_id.as_deref().unwrap_or(NO_DATA);
        let display_name = self
            .display_name
            .as_ref()
            .map(|name| name.to_string())
            .unwrap_or_else(|| NO_DATA.to_string());
        format!("{},{external_id},{display_name}", self.key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub resolved: Vec<Record>,
    pub unresolved: Vec<Record>,
}

impl ResultSet {
    pub fn push(&mut self, record: Record) {
        if record.is_complete() {
            self.resolved.push(record);
        } else {
            self.unresolved.push(record);
        }
    }

    pub fn total(&self) -> usize {
        self.resolved.len() + self.unresolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}
