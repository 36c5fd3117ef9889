// Remote Source Reader port. Implementations block; callers dispatch them to
// the worker pool.

use serde::{Deserialize, Serialize};

use crate::entities::ServerSource;
use crate::errors::SourceError;
use crate::value_objects::ServerKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteText {
    pub path: String,
    pub text: String,
    /// Byte offset the text starts at.
    pub start_offset: u64,
    /// Byte offset just past the last consumed byte.
    pub end_offset: u64,
    pub file_size: u64,
    pub encoding: String,
}

impl RemoteText {
    pub fn empty(path: &str, offset: u64, file_size: u64) -> Self {
        Self {
            path: path.to_string(),
            text: String::new(),
            start_offset: offset,
            end_offset: offset,
            file_size,
            encoding: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub modified_at: Option<i64>,
}

pub trait RemoteSource: Send + Sync {
    /// Whole file, decoded.
    fn fetch(&self, source: &ServerSource, path: &str) -> Result<RemoteText, SourceError>;

    /// Complete lines appended after `offset`. A trailing partial line is left
    /// for the next read. When the file is shorter than `offset` nothing is
    /// read and `file_size` reports the new length.
    fn fetch_from(
        &self,
        source: &ServerSource,
        path: &str,
        offset: u64,
    ) -> Result<RemoteText, SourceError>;

    /// Entries of `dir` whose names match the glob `pattern`.
    fn list(
        &self,
        source: &ServerSource,
        dir: &str,
        pattern: &str,
    ) -> Result<Vec<RemoteEntry>, SourceError>;

    fn close(&self, key: &ServerKey);

    fn close_all(&self);
}
