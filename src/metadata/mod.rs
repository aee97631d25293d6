//! Multi-valued document metadata.
//!
//! The worker reports metadata as an ordered list of `key,value` rows in which
//! the same key may appear many times (e.g. one `dc:creator` row per author).
//! [`Metadata`] keeps that shape: insertion order is preserved and [`Metadata::add`]
//! appends rather than overwrites.
//!
//! # Example
//!
//! ```
//! use isotika::metadata::Metadata;
//!
//! let mut metadata = Metadata::new();
//! metadata.add("dc:creator", "alice");
//! metadata.add("dc:creator", "bob");
//! metadata.set(Metadata::RESOURCE_NAME, "/tmp/report.pdf");
//!
//! assert_eq!(metadata.get_all("dc:creator"), vec!["alice", "bob"]);
//! assert_eq!(metadata.get(Metadata::RESOURCE_NAME), Some("/tmp/report.pdf"));
//! ```

use std::fmt;

/// Ordered mapping from keys to values, allowing repeated keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    /// Name of the resource being parsed, used by the worker as a hint.
    pub const RESOURCE_NAME: &'static str = "resourceName";

    /// MIME type of the document.
    pub const CONTENT_TYPE: &'static str = "Content-Type";

    /// Sentinel recorded when the worker answers 415 Unsupported Media Type.
    pub const PARSE_FAILURE_415: &'static str = "parseFailure415";

    /// Create an empty metadata set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value. Existing values for `key` are kept.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Replace every value for `key` with a single value.
    ///
    /// The new entry takes the position of the first existing one, or goes to
    /// the end if the key was absent.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter().position(|(k, _)| *k == key) {
            Some(first) => {
                self.entries[first].1 = value;
                let mut index = 0;
                self.entries.retain(|(k, _)| {
                    let keep = index <= first || *k != key;
                    index += 1;
                    keep
                });
            }
            None => self.entries.push((key, value)),
        }
    }

    /// First value recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values recorded for `key`, in insertion order.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Whether at least one value exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Distinct keys in first-seen order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (k, _) in &self.entries {
            if !names.contains(&k.as_str()) {
                names.push(k);
            }
        }
        names
    }

    /// Number of entries (not distinct keys).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in &self.entries {
            writeln!(f, "{}: {}", k, v)?;
        }
        Ok(())
    }
}
