//! Document model — the semantic tree every optimizer reads and writes.
//!
//! A [`Document`] is a JSON-like value: scalars, ordered sequences and
//! insertion-ordered mappings. Duplicate mapping keys are rejected when the
//! tree is built, so optimizers can assume a structurally valid document.

use crate::error::DocumentError;
use indexmap::IndexMap;
use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt::{self, Write as _};
use std::io;
use std::mem::size_of;

/// Mapping node storage. Iteration order is insertion order.
pub type Mapping = IndexMap<String, Document>;

/// JSON number, keeping the integer/float distinction of the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    PosInt(u64),
    NegInt(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::PosInt(v) => v as f64,
            Self::NegInt(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_f64() == 0.0
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Self::PosInt(v) => serializer.serialize_u64(v),
            Self::NegInt(v) => serializer.serialize_i64(v),
            Self::Float(v) => serializer.serialize_f64(v),
        }
    }
}

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Document {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<Document>),
    Mapping(Mapping),
}

/// One step of a path from the root to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Render a path as `$.key[3].other`.
pub fn display_path(segments: &[PathSegment]) -> String {
    let mut out = String::from("$");
    for segment in segments {
        match segment {
            PathSegment::Key(key) => {
                out.push('.');
                out.push_str(key);
            }
            PathSegment::Index(idx) => {
                let _ = write!(out, "[{idx}]");
            }
        }
    }
    out
}

impl Document {
    /// Empty mapping node.
    pub fn mapping() -> Self {
        Self::Mapping(Mapping::new())
    }

    /// Empty sequence node.
    pub fn sequence() -> Self {
        Self::Sequence(Vec::new())
    }

    /// Parse a JSON text, rejecting objects that repeat a key.
    pub fn from_json_str(text: &str) -> Result<Self, DocumentError> {
        let ctx = ParseContext::default();
        let mut de = serde_json::Deserializer::from_str(text);
        let parsed = DocumentSeed { ctx: &ctx }
            .deserialize(&mut de)
            .and_then(|doc| de.end().map(|_| doc));
        match parsed {
            Ok(doc) => Ok(doc),
            Err(err) => match ctx.collision.into_inner() {
                Some(KeyCollision { path, key }) => Err(DocumentError::DuplicateKey { path, key }),
                None => Err(DocumentError::Parse(err)),
            },
        }
    }

    /// Build a mapping from key/value pairs, rejecting duplicate keys.
    pub fn from_entries<I, K>(entries: I) -> Result<Self, DocumentError>
    where
        I: IntoIterator<Item = (K, Document)>,
        K: Into<String>,
    {
        let mut map = Mapping::new();
        for (key, value) in entries {
            let key = key.into();
            if map.contains_key(&key) {
                return Err(DocumentError::DuplicateKey { path: "$".into(), key });
            }
            map.insert(key, value);
        }
        Ok(Self::Mapping(map))
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Compact JSON byte length. Default measurement basis for size-oriented optimizers.
    pub fn serialized_size(&self) -> usize {
        let mut counter = ByteCounter::default();
        // Counting cannot fail and every Document is representable as JSON.
        let _ = serde_json::to_writer(&mut counter, self);
        counter.0
    }

    /// Number of nodes in the tree, the root included.
    pub fn node_count(&self) -> usize {
        match self {
            Self::Sequence(items) => 1 + items.iter().map(Self::node_count).sum::<usize>(),
            Self::Mapping(map) => 1 + map.values().map(Self::node_count).sum::<usize>(),
            _ => 1,
        }
    }

    /// Estimated heap working set of the in-memory tree, based on allocated capacity.
    pub fn heap_footprint(&self) -> usize {
        size_of::<Document>() + self.owned_heap_bytes()
    }

    fn owned_heap_bytes(&self) -> usize {
        match self {
            Self::String(s) => s.capacity(),
            Self::Sequence(items) => {
                items.capacity() * size_of::<Document>()
                    + items.iter().map(Self::owned_heap_bytes).sum::<usize>()
            }
            Self::Mapping(map) => {
                map.capacity() * MAPPING_SLOT_BYTES
                    + map
                        .iter()
                        .map(|(k, v)| k.capacity() + v.owned_heap_bytes())
                        .sum::<usize>()
            }
            _ => 0,
        }
    }

    /// Release excess capacity everywhere in the tree. Values are untouched.
    pub fn shrink_to_fit(&mut self) {
        match self {
            Self::String(s) => s.shrink_to_fit(),
            Self::Sequence(items) => {
                items.iter_mut().for_each(Self::shrink_to_fit);
                items.shrink_to_fit();
            }
            Self::Mapping(map) => {
                let rebuilt: Mapping = std::mem::take(map)
                    .into_iter()
                    .map(|(mut key, mut value)| {
                        key.shrink_to_fit();
                        value.shrink_to_fit();
                        (key, value)
                    })
                    .collect();
                *map = rebuilt;
                map.shrink_to_fit();
            }
            _ => {}
        }
    }

    /// Order-sensitive deep equality. `==` ignores mapping order.
    pub fn same_order(&self, other: &Document) -> bool {
        match (self, other) {
            (Self::Sequence(a), Self::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_order(y))
            }
            (Self::Mapping(a), Self::Mapping(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|((ka, va), (kb, vb))| ka == kb && va.same_order(vb))
            }
            _ => self == other,
        }
    }

    /// Pre-order traversal; mapping entries are visited in insertion order.
    pub fn walk<F>(&self, visit: &mut F)
    where
        F: FnMut(&[PathSegment], &Document),
    {
        let mut path = Vec::new();
        self.walk_inner(&mut path, visit);
    }

    fn walk_inner<F>(&self, path: &mut Vec<PathSegment>, visit: &mut F)
    where
        F: FnMut(&[PathSegment], &Document),
    {
        visit(path, self);
        match self {
            Self::Sequence(items) => {
                for (idx, item) in items.iter().enumerate() {
                    path.push(PathSegment::Index(idx));
                    item.walk_inner(path, visit);
                    path.pop();
                }
            }
            Self::Mapping(map) => {
                for (key, value) in map {
                    path.push(PathSegment::Key(key.clone()));
                    value.walk_inner(path, visit);
                    path.pop();
                }
            }
            _ => {}
        }
    }

    /// Visit every string scalar mutably, with its path.
    pub fn visit_strings_mut<F>(&mut self, visit: &mut F)
    where
        F: FnMut(&[PathSegment], &mut String),
    {
        let mut path = Vec::new();
        self.visit_strings_inner(&mut path, visit);
    }

    fn visit_strings_inner<F>(&mut self, path: &mut Vec<PathSegment>, visit: &mut F)
    where
        F: FnMut(&[PathSegment], &mut String),
    {
        match self {
            Self::String(s) => visit(path, s),
            Self::Sequence(items) => {
                for (idx, item) in items.iter_mut().enumerate() {
                    path.push(PathSegment::Index(idx));
                    item.visit_strings_inner(path, visit);
                    path.pop();
                }
            }
            Self::Mapping(map) => {
                for (key, value) in map.iter_mut() {
                    path.push(PathSegment::Key(key.clone()));
                    value.visit_strings_inner(path, visit);
                    path.pop();
                }
            }
            _ => {}
        }
    }

    /// Every string scalar, in traversal order.
    pub fn strings(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_strings(&mut out);
        out
    }

    fn collect_strings<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::String(s) => out.push(s),
            Self::Sequence(items) => items.iter().for_each(|i| i.collect_strings(out)),
            Self::Mapping(map) => map.values().for_each(|v| v.collect_strings(out)),
            _ => {}
        }
    }

    pub fn get(&self, key: &str) -> Option<&Document> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(n.as_f64()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Self::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Document]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_empty_sequence(&self) -> bool {
        matches!(self, Self::Sequence(items) if items.is_empty())
    }

    pub fn is_empty_mapping(&self) -> bool {
        matches!(self, Self::Mapping(map) if map.is_empty())
    }
}

/// Per-entry bookkeeping of an `IndexMap` slot: key, value, cached hash and index.
const MAPPING_SLOT_BYTES: usize =
    size_of::<String>() + size_of::<Document>() + size_of::<u64>() + size_of::<usize>();

#[derive(Default)]
struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.to_json_string().map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

// ========== Conversions ==========

impl From<bool> for Document {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Document {
    fn from(v: i64) -> Self {
        if v < 0 {
            Self::Number(Number::NegInt(v))
        } else {
            Self::Number(Number::PosInt(v as u64))
        }
    }
}

impl From<u64> for Document {
    fn from(v: u64) -> Self {
        Self::Number(Number::PosInt(v))
    }
}

/// NaN and infinities have no JSON form and are rejected.
impl TryFrom<f64> for Document {
    type Error = DocumentError;

    fn try_from(v: f64) -> Result<Self, Self::Error> {
        if v.is_finite() {
            Ok(Self::Number(Number::Float(v)))
        } else {
            Err(DocumentError::NonFiniteNumber(v))
        }
    }
}

impl From<&str> for Document {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Document {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<Document>> for Document {
    fn from(v: Vec<Document>) -> Self {
        Self::Sequence(v)
    }
}

impl From<Mapping> for Document {
    fn from(v: Mapping) -> Self {
        Self::Mapping(v)
    }
}

impl From<serde_json::Value> for Document {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => {
                if let Some(v) = n.as_u64() {
                    Self::Number(Number::PosInt(v))
                } else if let Some(v) = n.as_i64() {
                    Self::Number(Number::NegInt(v))
                } else {
                    // Without arbitrary precision every JSON number fits in a finite f64.
                    n.as_f64().map_or(Self::Null, |v| Self::Number(Number::Float(v)))
                }
            }
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Sequence(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Mapping(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&Document> for serde_json::Value {
    fn from(doc: &Document) -> Self {
        use serde_json::Value;
        match doc {
            Document::Null => Value::Null,
            Document::Bool(b) => Value::Bool(*b),
            Document::Number(Number::PosInt(v)) => Value::from(*v),
            Document::Number(Number::NegInt(v)) => Value::from(*v),
            Document::Number(Number::Float(v)) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Document::String(s) => Value::String(s.clone()),
            Document::Sequence(items) => Value::Array(items.iter().map(Value::from).collect()),
            Document::Mapping(map) => Value::Object(
                map.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect(),
            ),
        }
    }
}

// ========== Serde ==========

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Mapping(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let ctx = ParseContext::default();
        DocumentSeed { ctx: &ctx }.deserialize(deserializer)
    }
}

struct KeyCollision {
    path: String,
    key: String,
}

#[derive(Default)]
struct ParseContext {
    path: RefCell<Vec<PathSegment>>,
    collision: RefCell<Option<KeyCollision>>,
}

struct DocumentSeed<'a> {
    ctx: &'a ParseContext,
}

impl<'de> DeserializeSeed<'de> for DocumentSeed<'_> {
    type Value = Document;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Document, D::Error> {
        deserializer.deserialize_any(DocumentVisitor { ctx: self.ctx })
    }
}

struct DocumentVisitor<'a> {
    ctx: &'a ParseContext,
}

impl<'de> Visitor<'de> for DocumentVisitor<'_> {
    type Value = Document;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Document, E> {
        Ok(Document::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Document, E> {
        Ok(Document::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Document, E> {
        Ok(Document::Number(Number::PosInt(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Document, E> {
        Document::try_from(v).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Document, E> {
        Ok(Document::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Document, E> {
        Ok(Document::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Document, E> {
        Ok(Document::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Document, E> {
        Ok(Document::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Document, D::Error> {
        DocumentSeed { ctx: self.ctx }.deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Document, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        loop {
            self.ctx.path.borrow_mut().push(PathSegment::Index(items.len()));
            let next = seq.next_element_seed(DocumentSeed { ctx: self.ctx });
            self.ctx.path.borrow_mut().pop();
            match next? {
                Some(item) => items.push(item),
                None => break,
            }
        }
        Ok(Document::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Document, A::Error> {
        let mut map = Mapping::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(key) = access.next_key::<String>()? {
            if map.contains_key(&key) {
                let path = display_path(&self.ctx.path.borrow());
                let message = format!("duplicate key `{key}` at {path}");
                *self.ctx.collision.borrow_mut() = Some(KeyCollision { path, key });
                return Err(de::Error::custom(message));
            }
            self.ctx.path.borrow_mut().push(PathSegment::Key(key.clone()));
            let value = access.next_value_seed(DocumentSeed { ctx: self.ctx });
            self.ctx.path.borrow_mut().pop();
            map.insert(key, value?);
        }
        Ok(Document::Mapping(map))
    }
}
