//! Attendance domain types: names, attendees and the three-bucket
//! classification.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::collation;

/// A person's name with whitespace normalized.
///
/// Leading/trailing whitespace is trimmed and internal runs collapse to a
/// single space. Case and script are preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Name(String);

impl Name {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().split_whitespace().collect::<Vec<_>>().join(" "))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of characters (not bytes).
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    /// Case-insensitive substring test. `needle_lower` must already be lowercase.
    pub fn contains_lowercase(&self, needle_lower: &str) -> bool {
        self.0.to_lowercase().contains(needle_lower)
    }
}

impl From<String> for Name {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for Name {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.0
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which bucket an attendee belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// On the roster and seen in the session
    Present,
    /// On the roster, not seen
    Absent,
    /// Seen, not on the roster
    Unexpected,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Present, Status::Absent, Status::Unexpected];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Present => "present",
            Status::Absent => "absent",
            Status::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" | "p" => Ok(Status::Present),
            "absent" | "a" => Ok(Status::Absent),
            "unexpected" | "u" | "guest" => Ok(Status::Unexpected),
            other => Err(format!(
                "Unknown status '{other}' (expected present, absent or unexpected)"
            )),
        }
    }
}

/// One person in the classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub name: Name,
    pub status: Status,

    /// The form observed in the session when it differs from the roster form.
    /// Set for oracle matches; used to audit and to undo a match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<Name>,
}

impl Attendee {
    pub fn present(name: impl Into<Name>, original_name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            status: Status::Present,
            original_name: Some(original_name.into()),
        }
    }

    pub fn absent(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            status: Status::Absent,
            original_name: None,
        }
    }

    pub fn unexpected(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            status: Status::Unexpected,
            original_name: None,
        }
    }

    /// Case-insensitive substring match over `name` or `original_name`.
    pub fn matches_query(&self, needle_lower: &str) -> bool {
        self.name.contains_lowercase(needle_lower)
            || self
                .original_name
                .as_ref()
                .is_some_and(|o| o.contains_lowercase(needle_lower))
    }
}

/// Bucket sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCounts {
    pub present: usize,
    pub absent: usize,
    pub unexpected: usize,
}

impl BucketCounts {
    pub fn total(&self) -> usize {
        self.present + self.absent + self.unexpected
    }
}

/// The three-way attendance classification.
///
/// Each bucket holds attendees of its own status only, in collation order
/// by `name`, with no name repeated anywhere across the three buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub present: Vec<Attendee>,
    pub absent: Vec<Attendee>,
    pub unexpected: Vec<Attendee>,
}

impl Classification {
    pub fn bucket(&self, status: Status) -> &[Attendee] {
        match status {
            Status::Present => &self.present,
            Status::Absent => &self.absent,
            Status::Unexpected => &self.unexpected,
        }
    }

    pub fn bucket_mut(&mut self, status: Status) -> &mut Vec<Attendee> {
        match status {
            Status::Present => &mut self.present,
            Status::Absent => &mut self.absent,
            Status::Unexpected => &mut self.unexpected,
        }
    }

    /// Which bucket, if any, holds `name`.
    pub fn status_of(&self, name: &Name) -> Option<Status> {
        Status::ALL
            .into_iter()
            .find(|s| self.bucket(*s).iter().any(|a| &a.name == name))
    }

    pub fn counts(&self) -> BucketCounts {
        BucketCounts {
            present: self.present.len(),
            absent: self.absent.len(),
            unexpected: self.unexpected.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts().total() == 0
    }

    /// Iterate over every attendee, present first, then absent, then unexpected.
    pub fn iter(&self) -> impl Iterator<Item = &Attendee> {
        self.present
            .iter()
            .chain(self.absent.iter())
            .chain(self.unexpected.iter())
    }

    /// Sort every bucket in collation order.
    pub fn sort_all(&mut self) {
        for status in Status::ALL {
            self.sort_bucket(status);
        }
    }

    pub fn sort_bucket(&mut self, status: Status) {
        collation::sort_by_name(self.bucket_mut(status), |a| a.name.as_str());
    }

    pub fn is_sorted(&self) -> bool {
        Status::ALL
            .into_iter()
            .all(|s| collation::is_sorted_by_name(self.bucket(s), |a| a.name.as_str()))
    }

    /// True when no name occurs twice, within or across buckets, and every
    /// attendee's status matches its bucket.
    pub fn is_consistent(&self) -> bool {
        let mut seen = HashSet::new();
        Status::ALL.into_iter().all(|status| {
            self.bucket(status)
                .iter()
                .all(|a| a.status == status && seen.insert(a.name.clone()))
        })
    }

    /// A filtered copy: attendees whose `name` or `original_name` contains
    /// `query`, case-insensitively. An empty query returns everything.
    pub fn filtered(&self, query: &str) -> Classification {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.clone();
        }
        let keep = |bucket: &[Attendee]| -> Vec<Attendee> {
            bucket
                .iter()
                .filter(|a| a.matches_query(&needle))
                .cloned()
                .collect()
        };
        Classification {
            present: keep(&self.present),
            absent: keep(&self.absent),
            unexpected: keep(&self.unexpected),
        }
    }
}
