//!
//! Sparse field matching over nodes and their values.
//!
//! A [`SearchCriteria`] holds a pattern per [`Field`]; unset fields match
//! everything. The same criteria object drives ad-hoc searches through the
//! mapper and the filters of registered change listeners.

pub mod errors;

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::node::{Field, Node};

pub use errors::SearchError;

/// A sparse filter over node and value fields.
///
/// Set fields are anchored regular expressions matched against the
/// corresponding attribute; `PATH` is a subtree test instead. Value-level
/// matching has two modes:
///
/// - `KEY` unset but `VALUE`/`TYPE` set: the node matches when *any* of
///   its values satisfies all set value constraints.
/// - `KEY` set: the value with exactly that key must exist and satisfy
///   the `VALUE`/`TYPE` constraints.
///
/// This dual mode lets one criteria object express both "find nodes
/// containing a value" and "find nodes with this specific K/V" without a
/// separate query language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    fields: BTreeMap<Field, String>,
}

fn full_match(field: Field, pattern: &str, candidate: &str) -> Result<bool, SearchError> {
    let re = Regex::new(&format!(r"\A(?:{pattern})\z")).map_err(|e| {
        SearchError::InvalidPattern {
            field: field.as_str().to_string(),
            pattern: pattern.to_string(),
            source: e,
        }
    })?;
    Ok(re.is_match(candidate))
}

/// Subtree containment: the empty criteria path matches everything, and a
/// node matches when its path equals the criteria path or lies below it.
fn in_subtree(criteria_path: &str, node_path: &str) -> bool {
    criteria_path.is_empty()
        || node_path == criteria_path
        || node_path.starts_with(&format!("{criteria_path}:"))
}

impl SearchCriteria {
    /// Creates a criteria object with no constraints (matches every node).
    pub fn new() -> Self {
        Self::default()
    }

    /// The pattern set for a field, if any.
    pub fn get(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    /// Sets a field pattern, returning the previous one.
    pub fn set(&mut self, field: Field, pattern: impl Into<String>) -> Option<String> {
        self.fields.insert(field, pattern.into())
    }

    /// Removes a field pattern, returning it.
    pub fn unset(&mut self, field: Field) -> Option<String> {
        self.fields.remove(&field)
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, field: Field, pattern: impl Into<String>) -> Self {
        self.set(field, pattern);
        self
    }

    /// Whether no constraint is set.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The set fields and their patterns, in field order.
    pub fn entries(&self) -> impl Iterator<Item = (Field, &str)> {
        self.fields.iter().map(|(f, p)| (*f, p.as_str()))
    }

    /// Evaluates a node against this criteria.
    ///
    /// Returns an error if a set pattern is not a valid regular
    /// expression, or if the node cannot be materialized.
    pub fn evaluate(&self, node: &Node) -> crate::Result<bool> {
        if let Some(p) = self.get(Field::Path)
            && !in_subtree(p, node.path())
        {
            return Ok(false);
        }
        if let Some(p) = self.get(Field::Name)
            && !full_match(Field::Name, p, node.name())?
        {
            return Ok(false);
        }
        if let Some(p) = self.get(Field::Owner) {
            let owner = node.owner()?;
            match owner {
                Some(owner) if full_match(Field::Owner, p, &owner)? => {}
                _ => return Ok(false),
            }
        }
        if let Some(p) = self.get(Field::Visibility)
            && !full_match(Field::Visibility, p, node.visibility()?.as_str())?
        {
            return Ok(false);
        }
        if let Some(p) = self.get(Field::LastModified)
            && !full_match(Field::LastModified, p, &node.last_modified()?.to_string())?
        {
            return Ok(false);
        }

        let key = self.get(Field::Key);
        let value_pattern = self.get(Field::Value);
        let type_pattern = self.get(Field::Type);

        match key {
            None if value_pattern.is_some() || type_pattern.is_some() => {
                // any value satisfying all set constraints matches the node
                for value in node.values()?.values() {
                    if self.value_matches(value_pattern, type_pattern, value)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Some(key) => {
                // an exactly named value must exist and satisfy the constraints
                match node.value(key)? {
                    Some(value) => self.value_matches(value_pattern, type_pattern, &value),
                    None => Ok(false),
                }
            }
            None => Ok(true),
        }
    }

    fn value_matches(
        &self,
        value_pattern: Option<&str>,
        type_pattern: Option<&str>,
        value: &crate::node::NodeValue,
    ) -> crate::Result<bool> {
        if let Some(p) = type_pattern {
            match value.value_type() {
                Some(t) if full_match(Field::Type, p, t)? => {}
                _ => return Ok(false),
            }
        }
        if let Some(p) = value_pattern
            && !full_match(Field::Value, p, value.value())?
        {
            return Ok(false);
        }
        Ok(true)
    }
}
