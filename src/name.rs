use crate::errors::{ResolveError, Result};
use crate::parser;
use itertools::Itertools;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// An identifier chain such as `x.y.z`, kept as its ordered segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    segments: Vec<String>,
}

impl Name {
    pub fn new<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(ResolveError::MalformedName("empty name".into()));
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ResolveError::MalformedName(format!(
                "empty segment in '{}'",
                segments.join(".")
            )));
        }
        Ok(Self { segments })
    }

    pub fn parse(input: &str) -> Result<Self> {
        Ok(Self {
            segments: parser::parse_name(input)?,
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    /// Dotted form of the first `k` segments. `k` is clamped to `1..=len`.
    pub fn prefix(&self, k: usize) -> String {
        let k = k.clamp(1, self.segments.len());
        self.segments[..k].iter().join(".")
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.iter().join("."))
    }
}

impl std::str::FromStr for Name {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self> {
        Name::parse(s)
    }
}

/// Outcome of resolving a [`Name`] against a context.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Binding {
    /// A dotted prefix covering the whole name was bound in the context.
    ContextVariable { key: String, value: Value },
    /// Only `root_key` was bound; `remaining` is left to member access.
    MemberChain {
        root_key: String,
        root: Value,
        remaining: Vec<String>,
    },
}

impl Binding {
    pub fn is_context_variable(&self) -> bool {
        matches!(self, Binding::ContextVariable { .. })
    }

    /// The value the context handed back, before any member access.
    pub fn value(&self) -> &Value {
        match self {
            Binding::ContextVariable { value, .. } => value,
            Binding::MemberChain { root, .. } => root,
        }
    }

    pub fn remaining(&self) -> &[String] {
        match self {
            Binding::ContextVariable { .. } => &[],
            Binding::MemberChain { remaining, .. } => remaining,
        }
    }

    /// Follow the remaining segments through JSON objects and arrays.
    ///
    /// Object segments are key lookups; array segments must be non-negative
    /// indices. On failure the offending segment is returned.
    pub fn navigate(&self) -> std::result::Result<Value, String> {
        let mut current = self.value();
        for seg in self.remaining() {
            current = match current {
                Value::Object(map) => map.get(seg),
                Value::Array(arr) => seg.parse::<usize>().ok().and_then(|i| arr.get(i)),
                _ => None,
            }
            .ok_or_else(|| seg.clone())?;
        }
        Ok(current.clone())
    }
}
