//!
//! Binary wire format for nodes, values, and search criteria.
//!
//! Every primitive is written as `[type tag: i64][payload]` in big-endian
//! byte order; strings are `[byte length: i32][utf8]` with `-1` marking an
//! absent string. Composite records are framed by a fixed per-record tag
//! that is repeated at the end as an integrity check — a mismatch on
//! either side aborts the decode.
//!
//! Decoding takes an explicit [`DecodeContext`] carrying the
//! [`NodeLoader`] capability used to re-bind skeleton records; controller
//! identity itself is not serializable.
//!
//! Forward/backward compatibility across tag changes is not a goal: a tag
//! mismatch is a hard failure.

pub mod errors;

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;

use crate::node::{self, Field, Node, NodeLoader, NodeValue, Visibility};
use crate::search::SearchCriteria;

pub use errors::CodecError;

const LONG_UID: i64 = 1221312393;
const INT_UID: i64 = 122134568793;
const STRING_UID: i64 = 123798371293;
const ARRAY_UID: i64 = 8483923857311;
const NODE_UID: i64 = 11239348938;
const NODE_VALUE_UID: i64 = 871283188;
const CRITERIA_UID: i64 = 87128319541;
const ERROR_UID: i64 = 524987213391;

/// Context for decoding: carries the loader capability bound into
/// decoded skeleton nodes.
#[derive(Debug, Clone)]
pub struct DecodeContext {
    loader: Arc<dyn NodeLoader>,
}

impl DecodeContext {
    /// Context binding decoded skeletons to the given loader.
    pub fn new(loader: Arc<dyn NodeLoader>) -> Self {
        Self { loader }
    }

    /// Context whose skeletons cannot be materialized (no controller
    /// attached).
    pub fn detached() -> Self {
        Self {
            loader: node::detached_loader(),
        }
    }

    /// The loader handed to decoded skeleton nodes.
    pub fn loader(&self) -> Arc<dyn NodeLoader> {
        Arc::clone(&self.loader)
    }
}

fn write_raw_i64<W: Write>(out: &mut W, value: i64) -> Result<(), CodecError> {
    out.write_all(&value.to_be_bytes())?;
    Ok(())
}

fn read_raw_i64<R: Read>(input: &mut R) -> Result<i64, CodecError> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(i64::from_be_bytes(buf))
}

fn write_raw_i32<W: Write>(out: &mut W, value: i32) -> Result<(), CodecError> {
    out.write_all(&value.to_be_bytes())?;
    Ok(())
}

fn read_raw_i32<R: Read>(input: &mut R) -> Result<i32, CodecError> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

/// Writes a tagged 64-bit integer.
pub fn write_i64<W: Write>(out: &mut W, value: i64) -> Result<(), CodecError> {
    write_raw_i64(out, LONG_UID)?;
    write_raw_i64(out, value)
}

/// Reads a tagged 64-bit integer.
pub fn read_i64<R: Read>(input: &mut R) -> Result<i64, CodecError> {
    let tag = read_raw_i64(input)?;
    if tag != LONG_UID {
        return Err(CodecError::BadTypeTag {
            expected: LONG_UID,
            found: tag,
        });
    }
    read_raw_i64(input)
}

/// Writes a tagged 32-bit integer.
pub fn write_i32<W: Write>(out: &mut W, value: i32) -> Result<(), CodecError> {
    write_raw_i64(out, INT_UID)?;
    write_raw_i32(out, value)
}

/// Reads a tagged 32-bit integer.
pub fn read_i32<R: Read>(input: &mut R) -> Result<i32, CodecError> {
    let tag = read_raw_i64(input)?;
    if tag != INT_UID {
        return Err(CodecError::BadTypeTag {
            expected: INT_UID,
            found: tag,
        });
    }
    read_raw_i32(input)
}

/// Writes a tagged, length-prefixed string; `None` is encoded as length
/// `-1`.
pub fn write_string<W: Write>(out: &mut W, value: Option<&str>) -> Result<(), CodecError> {
    write_raw_i64(out, STRING_UID)?;
    match value {
        None => write_raw_i32(out, -1),
        Some(s) => {
            write_raw_i32(out, s.len() as i32)?;
            out.write_all(s.as_bytes())?;
            Ok(())
        }
    }
}

/// Reads a tagged, length-prefixed string.
pub fn read_string<R: Read>(input: &mut R) -> Result<Option<String>, CodecError> {
    let tag = read_raw_i64(input)?;
    if tag != STRING_UID {
        return Err(CodecError::BadTypeTag {
            expected: STRING_UID,
            found: tag,
        });
    }
    let length = read_raw_i32(input)?;
    if length == -1 {
        return Ok(None);
    }
    if length < 0 {
        return Err(CodecError::InvalidLength { length });
    }
    let mut buf = vec![0u8; length as usize];
    input.read_exact(&mut buf)?;
    Ok(Some(String::from_utf8(buf)?))
}

fn read_required_string<R: Read>(
    input: &mut R,
    what: &'static str,
) -> Result<String, CodecError> {
    read_string(input)?.ok_or(CodecError::UnexpectedNull { what })
}

/// Writes a tagged string array (the original format's stack-trace
/// carrier).
pub fn write_string_array<W: Write>(out: &mut W, values: &[String]) -> Result<(), CodecError> {
    write_raw_i64(out, ARRAY_UID)?;
    write_raw_i32(out, values.len() as i32)?;
    for value in values {
        write_string(out, Some(value))?;
    }
    Ok(())
}

/// Reads a tagged string array.
pub fn read_string_array<R: Read>(input: &mut R) -> Result<Vec<String>, CodecError> {
    let tag = read_raw_i64(input)?;
    if tag != ARRAY_UID {
        return Err(CodecError::BadTypeTag {
            expected: ARRAY_UID,
            found: tag,
        });
    }
    let count = read_raw_i32(input)?;
    if count < 0 {
        return Err(CodecError::InvalidLength { length: count });
    }
    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        values.push(read_required_string(input, "array element")?);
    }
    Ok(values)
}

fn expect_record_tag<R: Read>(
    input: &mut R,
    record: &'static str,
    uid: i64,
) -> Result<(), CodecError> {
    let found = read_i64(input)?;
    if found != uid {
        return Err(CodecError::BadRecordTag { record, found });
    }
    Ok(())
}

fn expect_record_end<R: Read>(
    input: &mut R,
    record: &'static str,
    uid: i64,
) -> Result<(), CodecError> {
    let found = read_i64(input)?;
    if found != uid {
        return Err(CodecError::BadRecordEnd { record, found });
    }
    Ok(())
}

fn read_count<R: Read>(input: &mut R) -> Result<usize, CodecError> {
    let count = read_i32(input)?;
    if count < 0 {
        return Err(CodecError::InvalidLength { length: count });
    }
    Ok(count as usize)
}

/// Encodes a node value record.
pub fn encode_value<W: Write>(out: &mut W, value: &NodeValue) -> Result<(), CodecError> {
    write_i64(out, NODE_VALUE_UID)?;
    write_string(out, Some(value.key()))?;

    let translations = value.value_map();
    write_i32(out, translations.len() as i32)?;
    for (locale, s) in translations {
        write_string(out, Some(locale))?;
        write_string(out, Some(s))?;
    }

    write_string(out, value.value_type())?;
    write_i64(out, value.last_modified())?;

    let descriptions = value.description_map();
    write_i32(out, descriptions.len() as i32)?;
    for (locale, s) in descriptions {
        write_string(out, Some(locale))?;
        write_string(out, Some(s))?;
    }

    write_i64(out, NODE_VALUE_UID)
}

/// Decodes a node value record.
pub fn decode_value<R: Read>(input: &mut R) -> Result<NodeValue, CodecError> {
    expect_record_tag(input, "NodeValue", NODE_VALUE_UID)?;
    let key = read_required_string(input, "value key")?;

    let mut translations = BTreeMap::new();
    for _ in 0..read_count(input)? {
        let locale = read_required_string(input, "locale tag")?;
        let s = read_required_string(input, "translation")?;
        translations.insert(locale, s);
    }

    let value_type = read_string(input)?;
    let last_modified = read_i64(input)?;

    let mut descriptions = BTreeMap::new();
    for _ in 0..read_count(input)? {
        let locale = read_required_string(input, "locale tag")?;
        let s = read_required_string(input, "translation")?;
        descriptions.insert(locale, s);
    }

    expect_record_end(input, "NodeValue", NODE_VALUE_UID)?;
    Ok(NodeValue::from_parts(
        key,
        translations,
        value_type,
        descriptions,
        last_modified,
    ))
}

/// Encodes a node record, recursing into child records.
///
/// Skeleton nodes encode as reference-only records (path, flags, and the
/// visibility when known); materialization is never triggered.
pub fn encode_node<W: Write>(out: &mut W, node: &Node) -> Result<(), CodecError> {
    write_i64(out, NODE_UID)?;
    match node.state_clone() {
        node::NodeState::Skeleton {
            tombstone,
            visibility,
            ..
        } => {
            write_i32(out, 1)?;
            write_i32(out, tombstone as i32)?;
            write_string(out, Some(node.path()))?;
            write_i32(out, visibility.is_some() as i32)?;
            if let Some(vis) = visibility {
                write_string(out, Some(Field::Visibility.as_str()))?;
                write_string(out, Some(vis.as_str()))?;
            }
        }
        node::NodeState::Materialized(content) => {
            write_i32(out, 0)?;
            write_i32(out, content.tombstone as i32)?;
            write_string(out, Some(node.path()))?;

            // ordinals, path excluded
            write_i32(out, 2 + content.owner.is_some() as i32)?;
            if let Some(owner) = &content.owner {
                write_string(out, Some(Field::Owner.as_str()))?;
                write_string(out, Some(owner))?;
            }
            write_string(out, Some(Field::Visibility.as_str()))?;
            write_string(out, Some(content.visibility.as_str()))?;
            write_string(out, Some(Field::LastModified.as_str()))?;
            write_string(out, Some(&content.last_modified.to_string()))?;

            if !content.tombstone {
                write_i32(out, content.values.len() as i32)?;
                for (key, value) in &content.values {
                    write_string(out, Some(key))?;
                    encode_value(out, value)?;
                }
                write_i32(out, content.children.len() as i32)?;
                for (name, child) in &content.children {
                    write_string(out, Some(name))?;
                    encode_node(out, child)?;
                }
            }
        }
    }
    write_i64(out, NODE_UID)
}

/// Decodes a node record, re-binding skeletons to the context loader.
pub fn decode_node<R: Read>(input: &mut R, ctx: &DecodeContext) -> Result<Node, CodecError> {
    expect_record_tag(input, "Node", NODE_UID)?;
    let skeleton = read_i32(input)? == 1;
    let tombstone = read_i32(input)? == 1;
    let path = read_required_string(input, "node path")?;

    let mut owner = None;
    let mut visibility = None;
    let mut last_modified = None;
    for _ in 0..read_count(input)? {
        let name = read_required_string(input, "ordinal name")?;
        let value = read_required_string(input, "ordinal value")?;
        match Field::parse(&name) {
            Some(Field::Owner) => owner = Some(value),
            Some(Field::Visibility) => {
                visibility = Some(Visibility::parse(&value).ok_or(CodecError::InvalidOrdinal {
                    field: "visibility",
                    value: value.clone(),
                })?);
            }
            Some(Field::LastModified) => {
                last_modified =
                    Some(value.parse::<i64>().map_err(|_| CodecError::InvalidOrdinal {
                        field: "last_modified",
                        value: value.clone(),
                    })?);
            }
            _ => return Err(CodecError::UnknownField { name }),
        }
    }

    let node = if skeleton {
        Node::skeleton_with(path, ctx.loader(), tombstone, visibility)
    } else {
        let mut values = BTreeMap::new();
        let mut children = BTreeMap::new();
        if !tombstone {
            for _ in 0..read_count(input)? {
                let key = read_required_string(input, "value key")?;
                values.insert(key, decode_value(input)?);
            }
            for _ in 0..read_count(input)? {
                let name = read_required_string(input, "child name")?;
                children.insert(name, decode_node(input, ctx)?);
            }
        }
        Node::from_parts(
            path,
            node::NodeContent {
                owner,
                visibility: visibility.unwrap_or_default(),
                last_modified: last_modified.unwrap_or(0),
                tombstone,
                values,
                children,
            },
        )
    };

    expect_record_end(input, "Node", NODE_UID)?;
    Ok(node)
}

/// Encodes a search criteria record.
pub fn encode_criteria<W: Write>(
    out: &mut W,
    criteria: &SearchCriteria,
) -> Result<(), CodecError> {
    write_i64(out, CRITERIA_UID)?;
    write_i32(out, criteria.entries().count() as i32)?;
    for (field, pattern) in criteria.entries() {
        write_string(out, Some(field.as_str()))?;
        write_string(out, Some(pattern))?;
    }
    write_i64(out, CRITERIA_UID)
}

/// Decodes a search criteria record.
pub fn decode_criteria<R: Read>(input: &mut R) -> Result<SearchCriteria, CodecError> {
    expect_record_tag(input, "SearchCriteria", CRITERIA_UID)?;
    let mut criteria = SearchCriteria::new();
    for _ in 0..read_count(input)? {
        let name = read_required_string(input, "criteria field")?;
        let pattern = read_required_string(input, "criteria pattern")?;
        let field = Field::parse(&name).ok_or(CodecError::UnknownField { name })?;
        criteria.set(field, pattern);
    }
    expect_record_end(input, "SearchCriteria", CRITERIA_UID)?;
    Ok(criteria)
}

/// Transport snapshot of an engine error: its kind, message, and source
/// chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Module classification of the error.
    pub kind: String,
    /// Rendered top-level message.
    pub message: String,
    /// Messages of the source chain, outermost first.
    pub trace: Vec<String>,
}

impl ErrorRecord {
    /// Snapshot an engine error for transport.
    pub fn from_error(err: &crate::Error) -> Self {
        let mut trace = Vec::new();
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            trace.push(cause.to_string());
            source = cause.source();
        }
        Self {
            kind: err.module().to_string(),
            message: err.to_string(),
            trace,
        }
    }

    /// Encodes this error record.
    pub fn encode<W: Write>(&self, out: &mut W) -> Result<(), CodecError> {
        write_i64(out, ERROR_UID)?;
        write_string(out, Some(&self.kind))?;
        write_string(out, Some(&self.message))?;
        write_string_array(out, &self.trace)?;
        write_i64(out, ERROR_UID)
    }

    /// Decodes an error record.
    pub fn decode<R: Read>(input: &mut R) -> Result<Self, CodecError> {
        expect_record_tag(input, "ErrorRecord", ERROR_UID)?;
        let kind = read_required_string(input, "error kind")?;
        let message = read_required_string(input, "error message")?;
        let trace = read_string_array(input)?;
        expect_record_end(input, "ErrorRecord", ERROR_UID)?;
        Ok(Self {
            kind,
            message,
            trace,
        })
    }
}

/// Encodes a node into a fresh byte buffer.
pub fn node_to_bytes(node: &Node) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    encode_node(&mut buf, node)?;
    Ok(buf)
}

/// Decodes a node from a byte slice.
pub fn node_from_bytes(mut bytes: &[u8], ctx: &DecodeContext) -> Result<Node, CodecError> {
    decode_node(&mut bytes, ctx)
}

/// Encodes a node value into a fresh byte buffer.
pub fn value_to_bytes(value: &NodeValue) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    encode_value(&mut buf, value)?;
    Ok(buf)
}

/// Decodes a node value from a byte slice.
pub fn value_from_bytes(mut bytes: &[u8]) -> Result<NodeValue, CodecError> {
    decode_value(&mut bytes)
}

/// Encodes search criteria into a fresh byte buffer.
pub fn criteria_to_bytes(criteria: &SearchCriteria) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    encode_criteria(&mut buf, criteria)?;
    Ok(buf)
}

/// Decodes search criteria from a byte slice.
pub fn criteria_from_bytes(mut bytes: &[u8]) -> Result<SearchCriteria, CodecError> {
    decode_criteria(&mut bytes)
}
