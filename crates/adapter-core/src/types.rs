//! Record types returned by the adapter facade

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Whether a record describes a stored object or an emulated directory
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    File,
    Dir,
}

/// Read access granted to anonymous users
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(Error::InvalidConfig {
                message: format!("unknown visibility {other:?}, expected public or private"),
            }),
        }
    }
}

/// Uniform metadata record produced by every read, write and metadata operation
///
/// Fields the service did not report stay `None` and are omitted when serialized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageRecord {
    /// Logical path (prefix stripped)
    pub path: String,

    #[serde(rename = "type")]
    pub kind: RecordKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,

    /// Seconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

impl StorageRecord {
    /// Bare file record with only the path set
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: RecordKind::File,
            size: None,
            mimetype: None,
            timestamp: None,
            visibility: None,
        }
    }

    /// Directory record; directories carry no other metadata
    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            kind: RecordKind::Dir,
            ..Self::file(path)
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == RecordKind::Dir
    }

    pub fn is_file(&self) -> bool {
        self.kind == RecordKind::File
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }
}
