//! Resource declarations
//!
//! A declaration is one unit of desired infrastructure state: an identifier,
//! a kind tag, attributes (which may reference other resources' outputs)
//! and an optional list of explicit dependencies.

use crate::error::Error;
use crate::value::{Attributes, Reference, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind tag of a declared resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Object storage bucket
    Bucket,
    /// Identity role
    Role,
    /// Permission policy attached to a role
    Policy,
    /// Compute function
    Function,
    /// Log group
    LogGroup,
}

impl ResourceKind {
    pub const ALL: [Self; 5] = [
        Self::Bucket,
        Self::Role,
        Self::Policy,
        Self::Function,
        Self::LogGroup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bucket => "bucket",
            Self::Role => "role",
            Self::Policy => "policy",
            Self::Function => "function",
            Self::LogGroup => "log_group",
        }
    }

    /// Human-readable label used when grouping output
    pub fn label(&self) -> &'static str {
        match self {
            Self::Bucket => "Buckets",
            Self::Role => "Roles",
            Self::Policy => "Policies",
            Self::Function => "Functions",
            Self::LogGroup => "Log groups",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::UnknownKind(s.to_string()))
    }
}

/// A declared resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    /// Unique identifier within the declaration set
    pub id: String,
    /// Kind tag
    pub kind: ResourceKind,
    /// Desired attributes, possibly containing references
    #[serde(default)]
    pub attributes: Attributes,
    /// Explicit dependency edges, in addition to references
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl Declaration {
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            attributes: Attributes::new(),
            depends_on: Vec::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder-style explicit dependency
    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !self.depends_on.contains(&id) {
            self.depends_on.push(id);
        }
        self
    }

    /// All references found in the attributes
    pub fn references(&self) -> Vec<&Reference> {
        self.attributes.values().flat_map(Value::references).collect()
    }

    /// Identifiers this declaration depends on, explicit edges first,
    /// without duplicates
    pub fn dependency_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        let explicit = self.depends_on.iter().map(String::as_str);
        let implicit = self.references().into_iter().map(|r| r.resource.as_str());
        for id in explicit.chain(implicit) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Check whether a plan target selects this declaration
    ///
    /// Target format: "id", "kind" or "kind.id"
    pub fn matches_target(&self, target: &str) -> bool {
        if self.id == target || self.kind.as_str() == target {
            return true;
        }
        match target.split_once('.') {
            Some((kind, id)) => kind == self.kind.as_str() && id == self.id,
            None => false,
        }
    }
}
