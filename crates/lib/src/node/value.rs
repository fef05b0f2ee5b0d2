//! Localized key/value pairs stored on a node.
//!
//! A [`NodeValue`] carries a value string per locale tag plus an optional
//! searchable type and a localized description. The default locale entry
//! is mandatory: a translation may only be added once the base string
//! exists, mirroring a base-translation requirement.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::clock;
use crate::constants::DEFAULT_LOCALE;
use crate::node::errors::NodeError;

/// A localized key/value pair owned by exactly one node.
///
/// The key is unique within the owning node. Values and descriptions are
/// maps from locale tag (`"en"`, `"de-CH"`) to string; lookup resolves an
/// exact tag first, then the primary subtag, then the default locale.
///
/// Equality compares key, type, value translations, and description
/// translations; the last-modified stamp is deliberately excluded so a
/// re-submission of identical content compares equal to the stored copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeValue {
    key: String,
    value: BTreeMap<String, String>,
    value_type: Option<String>,
    description: BTreeMap<String, String>,
    last_modified: i64,
}

/// Looks up a localized string: exact tag, then primary subtag, then the
/// default locale.
fn lookup<'a>(map: &'a BTreeMap<String, String>, language_range: &str) -> Option<&'a str> {
    if let Some(s) = map.get(language_range) {
        return Some(s.as_str());
    }
    let primary = language_range
        .split('-')
        .next()
        .unwrap_or(language_range);
    if let Some(s) = map.get(primary) {
        return Some(s.as_str());
    }
    map.get(DEFAULT_LOCALE).map(String::as_str)
}

/// Inserts a localized string, requiring the default-locale base entry to
/// exist first.
fn insert_localized(
    map: &mut BTreeMap<String, String>,
    value: String,
    locale: &str,
) -> Result<(), NodeError> {
    if locale != DEFAULT_LOCALE && !map.contains_key(DEFAULT_LOCALE) {
        return Err(NodeError::MissingDefaultTranslation {
            locale: locale.to_string(),
            default: DEFAULT_LOCALE.to_string(),
        });
    }
    map.insert(locale.to_string(), value);
    Ok(())
}

impl NodeValue {
    /// Create a new key/value pair with the value stored under the
    /// default locale. Type and description start out unset.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut values = BTreeMap::new();
        values.insert(DEFAULT_LOCALE.to_string(), value.into());
        Self {
            key: key.into(),
            value: values,
            value_type: None,
            description: BTreeMap::new(),
            last_modified: clock::now_millis(),
        }
    }

    /// Create a fully populated key/value pair suitable for sharing.
    pub fn with_details(
        key: impl Into<String>,
        value: impl Into<String>,
        value_type: Option<String>,
        description: Option<String>,
    ) -> Self {
        let mut v = Self::new(key, value);
        v.value_type = value_type;
        if let Some(d) = description {
            v.description.insert(DEFAULT_LOCALE.to_string(), d);
        }
        v
    }

    /// The key identifying this value within its node.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The default-locale value string.
    pub fn value(&self) -> &str {
        self.value
            .get(DEFAULT_LOCALE)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// The value string best matching a language range.
    pub fn value_for(&self, language_range: &str) -> &str {
        lookup(&self.value, language_range).unwrap_or_default()
    }

    /// All value translations, keyed by locale tag.
    pub fn translations(&self) -> BTreeMap<String, String> {
        self.value.clone()
    }

    /// Replace the default-locale value string.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value.insert(DEFAULT_LOCALE.to_string(), value.into());
        self.touch();
    }

    /// Set the value string for a specific locale.
    ///
    /// Fails if the default-locale entry does not exist yet and `locale`
    /// is not the default locale.
    pub fn set_value_localized(
        &mut self,
        value: impl Into<String>,
        locale: &str,
    ) -> Result<(), NodeError> {
        insert_localized(&mut self.value, value.into(), locale)?;
        self.touch();
        Ok(())
    }

    /// The searchable type tag, if any.
    pub fn value_type(&self) -> Option<&str> {
        self.value_type.as_deref()
    }

    /// Replace the type tag, returning the previous one.
    pub fn set_type(&mut self, value_type: Option<String>) -> Option<String> {
        let ret = std::mem::replace(&mut self.value_type, value_type);
        self.touch();
        ret
    }

    /// The default-locale description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.get(DEFAULT_LOCALE).map(String::as_str)
    }

    /// The description best matching a language range.
    pub fn description_for(&self, language_range: &str) -> Option<&str> {
        lookup(&self.description, language_range)
    }

    /// All description translations, keyed by locale tag.
    pub fn description_translations(&self) -> BTreeMap<String, String> {
        self.description.clone()
    }

    /// Replace the default-locale description.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description
            .insert(DEFAULT_LOCALE.to_string(), description.into());
        self.touch();
    }

    /// Set the description for a specific locale; the default-locale
    /// entry must exist first.
    pub fn set_description_localized(
        &mut self,
        description: impl Into<String>,
        locale: &str,
    ) -> Result<(), NodeError> {
        insert_localized(&mut self.description, description.into(), locale)?;
        self.touch();
        Ok(())
    }

    /// Milliseconds since epoch of the last mutation.
    pub fn last_modified(&self) -> i64 {
        self.last_modified
    }

    /// Overrides the modification stamp (used when restoring a value from
    /// a wire record or a replica).
    pub fn set_last_modified(&mut self, millis: i64) {
        self.last_modified = millis;
    }

    /// Replace all content from `other`, refreshing the modification
    /// stamp.
    pub fn update_from(&mut self, other: &NodeValue) {
        self.key = other.key.clone();
        self.value = other.value.clone();
        self.value_type = other.value_type.clone();
        self.description = other.description.clone();
        self.touch();
    }

    /// Full independent copy.
    pub fn deep_clone(&self) -> NodeValue {
        self.clone()
    }

    fn touch(&mut self) {
        self.last_modified = clock::now_millis();
    }

    pub(crate) fn value_map(&self) -> &BTreeMap<String, String> {
        &self.value
    }

    pub(crate) fn description_map(&self) -> &BTreeMap<String, String> {
        &self.description
    }

    pub(crate) fn from_parts(
        key: String,
        value: BTreeMap<String, String>,
        value_type: Option<String>,
        description: BTreeMap<String, String>,
        last_modified: i64,
    ) -> Self {
        Self {
            key,
            value,
            value_type,
            description,
            last_modified,
        }
    }
}

impl PartialEq for NodeValue {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.value == other.value
            && self.value_type == other.value_type
            && self.description == other.description
    }
}

impl Eq for NodeValue {}

impl std::fmt::Display for NodeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)?;
        if let Some(t) = &self.value_type {
            write!(f, ":{t}")?;
        }
        write!(f, "={{")?;
        let mut first = true;
        for (locale, value) in &self.value {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{locale}=>\"{value}\"")?;
            first = false;
        }
        write!(f, "}}")
    }
}
