//! Attribute values and cross-resource references
//!
//! Declared attributes are a tagged tree rather than free-form maps, so
//! finding and resolving references is a structural walk.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute mapping of a resource, ordered by key
pub type Attributes = BTreeMap<String, Value>;

/// Pointer from one resource's attribute to another resource's output
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// Identifier of the referenced resource
    pub resource: String,
    /// Attribute name on the referenced resource
    pub attribute: String,
}

impl Reference {
    pub fn new(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            attribute: attribute.into(),
        }
    }

    /// Parse `resource.attribute`
    ///
    /// The split happens on the first dot, so attribute names may contain dots.
    pub fn parse(s: &str) -> Option<Self> {
        let (resource, attribute) = s.split_once('.')?;
        if resource.is_empty() || attribute.is_empty() {
            return None;
        }
        Some(Self::new(resource, attribute))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.attribute)
    }
}

/// A scalar attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// An attribute value: literal, reference, or a nested list/map of values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Literal(Literal),
    Reference(Reference),
    List(Vec<Value>),
    Map(Attributes),
}

impl Value {
    /// Shorthand for a string literal
    pub fn string(s: impl Into<String>) -> Self {
        Self::Literal(Literal::String(s.into()))
    }

    /// Shorthand for a reference value
    pub fn reference(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::Reference(Reference::new(resource, attribute))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Literal(Literal::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Literal(Literal::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Literal(Literal::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Attributes> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Every reference contained in this value, depth-first
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            Self::Literal(_) => {}
            Self::Reference(r) => out.push(r),
            Self::List(items) => items.iter().for_each(|v| v.collect_references(out)),
            Self::Map(map) => map.values().for_each(|v| v.collect_references(out)),
        }
    }

    /// Whether the value contains no references
    pub fn is_resolved(&self) -> bool {
        match self {
            Self::Literal(_) => true,
            Self::Reference(_) => false,
            Self::List(items) => items.iter().all(Value::is_resolved),
            Self::Map(map) => map.values().all(Value::is_resolved),
        }
    }

    /// Replace every reference with the value produced by `lookup`
    pub fn resolve<F>(&self, lookup: &F) -> Result<Value>
    where
        F: Fn(&Reference) -> Option<Value>,
    {
        match self {
            Self::Literal(_) => Ok(self.clone()),
            Self::Reference(r) => lookup(r).ok_or_else(|| Error::MissingAttribute {
                reference: r.to_string(),
            }),
            Self::List(items) => items
                .iter()
                .map(|v| v.resolve(lookup))
                .collect::<Result<Vec<_>>>()
                .map(Self::List),
            Self::Map(map) => resolve_attributes(map, lookup).map(Self::Map),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(l) => write!(f, "{l}"),
            Self::Reference(r) => write!(f, "${{{r}}}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k} = {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::string(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Literal(Literal::Bool(b))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Literal(Literal::Int(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Literal(Literal::Float(x))
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Self::Reference(r)
    }
}

/// Resolve every attribute of a mapping
pub fn resolve_attributes<F>(attributes: &Attributes, lookup: &F) -> Result<Attributes>
where
    F: Fn(&Reference) -> Option<Value>,
{
    attributes
        .iter()
        .map(|(k, v)| Ok((k.clone(), v.resolve(lookup)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference() {
        assert_eq!(
            Reference::parse("bucket.arn"),
            Some(Reference::new("bucket", "arn"))
        );
        assert_eq!(
            Reference::parse("bucket.tags.env"),
            Some(Reference::new("bucket", "tags.env"))
        );
        assert_eq!(Reference::parse("bucket"), None);
        assert_eq!(Reference::parse(".arn"), None);
        assert_eq!(Reference::parse("bucket."), None);
    }

    #[test]
    fn test_references_walks_nested_values() {
        let mut env = Attributes::new();
        env.insert("BUCKET_NAME".into(), Value::reference("bucket", "name"));
        let value = Value::List(vec![
            Value::reference("role", "arn"),
            Value::Map(env),
            Value::from("plain"),
        ]);

        let refs: Vec<String> = value.references().iter().map(|r| r.to_string()).collect();
        assert_eq!(refs, vec!["role.arn", "bucket.name"]);
        assert!(!value.is_resolved());
    }

    #[test]
    fn test_resolve_replaces_references() {
        let value = Value::List(vec![Value::reference("bucket", "name"), Value::from(3_i64)]);
        let resolved = value
            .resolve(&|r: &Reference| (r.attribute == "name").then(|| Value::from("records")))
            .unwrap();
        assert_eq!(
            resolved,
            Value::List(vec![Value::from("records"), Value::from(3_i64)])
        );
        assert!(resolved.is_resolved());
    }

    #[test]
    fn test_resolve_missing_attribute() {
        let value = Value::reference("bucket", "arn");
        let err = value.resolve(&|_: &Reference| None).unwrap_err();
        assert!(matches!(err, Error::MissingAttribute { reference } if reference == "bucket.arn"));
    }

    #[test]
    fn test_display() {
        let mut map = Attributes::new();
        map.insert("a".into(), Value::from(true));
        map.insert("b".into(), Value::reference("x", "y"));
        assert_eq!(Value::Map(map).to_string(), "{a = true, b = ${x.y}}");
    }
}
