//! Field normalization: key casing and reference rewriting.
//!
//! The element API has no uniform reference encoding. Foreign keys arrive as
//! bare integers in arrays, as stub objects carrying a type tag and an id, or
//! inside "repeatable" blocks encoded as objects with integer keys. Objects
//! are sorted into a [`Shape`] by [`classify`]; the walker in [`Normalizer`]
//! then rewrites each shape.

use serde_json::{Map, Value};
use tracing::debug;

use crate::casing::camel_case;
use crate::index::IdIndex;
use crate::node::{FieldMap, FieldValue, RecordId, Reference};

/// What an object value looks like.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape<'a> {
    /// Every key is numeric (`{"0": .., "1": ..}`); values in key order.
    Sequence(Vec<&'a Value>),
    /// `{post_type, ID|id}` stub pointing at another element.
    EntityReference { tag: String, id: RecordId },
    /// `{filename, ID|id}` stub pointing at an asset.
    AttachmentReference { id: RecordId },
    /// `{rendered: ..}` wrapper; carries the inner value.
    RichText(&'a Value),
    PlainMapping,
}

/// Classify an object by its keys. Checks run in a fixed order and the
/// first match wins.
pub fn classify(map: &Map<String, Value>) -> Shape<'_> {
    if map.keys().all(|k| is_numeric_key(k)) {
        let mut entries: Vec<(f64, &Value)> = map
            .iter()
            .map(|(k, v)| (numeric_key_value(k), v))
            .collect();
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        return Shape::Sequence(entries.into_iter().map(|(_, v)| v).collect());
    }

    let id = stub_id(map);

    if let (Some(tag), Some(id)) = (map.get("post_type").filter(|t| is_truthy(t)), id.clone()) {
        let tag = match tag {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Shape::EntityReference { tag, id };
    }

    if let (true, Some(id)) = (map.get("filename").is_some_and(is_truthy), id) {
        return Shape::AttachmentReference { id };
    }

    if let Some(rendered) = map.get("rendered") {
        return Shape::RichText(rendered);
    }

    Shape::PlainMapping
}

/// A key counts as numeric if it is blank or reads as a finite or infinite
/// number. Of the spelled-out forms only `Infinity` is accepted; `nan`,
/// `inf` and friends are ordinary words.
fn is_numeric_key(key: &str) -> bool {
    let key = key.trim();
    if key.is_empty() {
        return true;
    }
    let unsigned = key.strip_prefix(['+', '-']).unwrap_or(key);
    if unsigned.starts_with(['+', '-']) {
        return false;
    }
    if unsigned.starts_with(|c: char| c.is_alphabetic()) {
        return unsigned == "Infinity";
    }
    unsigned.parse::<f64>().is_ok_and(|n| !n.is_nan())
}

fn numeric_key_value(key: &str) -> f64 {
    match key.trim() {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        other => other.parse().unwrap_or(0.0),
    }
}

/// `ID` takes precedence over `id`; either must be truthy.
fn stub_id(map: &Map<String, Value>) -> Option<RecordId> {
    ["ID", "id"]
        .iter()
        .filter_map(|k| map.get(*k))
        .find(|v| is_truthy(v))
        .and_then(RecordId::from_value)
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Recursive field walker bound to one immutable index.
pub struct Normalizer<'a> {
    index: &'a IdIndex,
    unresolved: usize,
}

impl<'a> Normalizer<'a> {
    pub fn new(index: &'a IdIndex) -> Self {
        Self { index, unresolved: 0 }
    }

    /// References built so far whose id was not in the index.
    pub fn unresolved(&self) -> usize {
        self.unresolved
    }

    /// Normalize a record's field set: camelCase keys, numeric-keyed
    /// objects flattened to arrays, values rewritten by [`Self::normalize_value`].
    pub fn normalize_fields(&mut self, fields: &Map<String, Value>) -> FieldMap {
        let mut out = FieldMap::with_capacity(fields.len());

        for (key, value) in fields {
            let normalized = match value {
                Value::Object(map) => match classify(map) {
                    Shape::Sequence(items) => self.normalize_list(items),
                    _ => self.normalize_value(value),
                },
                _ => self.normalize_value(value),
            };
            out.insert(camel_case(key), normalized);
        }

        out
    }

    pub fn normalize_value(&mut self, value: &Value) -> FieldValue {
        match value {
            Value::Null => FieldValue::Null,
            Value::Array(items) => self.normalize_list(items.iter()),
            Value::Object(map) => match classify(map) {
                Shape::EntityReference { tag, id } => {
                    let reference = self.reference(id);
                    if !reference.is_resolved() {
                        debug!("'{}' stub {} has no indexed target", tag, reference.id);
                    }
                    FieldValue::Reference(reference)
                }
                Shape::AttachmentReference { id } => FieldValue::Reference(self.reference(id)),
                Shape::RichText(inner) => FieldValue::Raw(inner.clone()),
                Shape::Sequence(_) | Shape::PlainMapping => FieldValue::Map(self.normalize_fields(map)),
            },
            scalar => FieldValue::Raw(scalar.clone()),
        }
    }

    /// Integer-like elements are bare foreign keys; everything else recurses.
    fn normalize_list<'v>(&mut self, items: impl IntoIterator<Item = &'v Value>) -> FieldValue {
        let list = items
            .into_iter()
            .map(|item| match RecordId::from_integer_like(item) {
                Some(id) => FieldValue::Reference(self.reference(id)),
                None => self.normalize_value(item),
            })
            .collect();
        FieldValue::List(list)
    }

    /// Reference resolved through the index alone. Stub tags never name the
    /// target collection.
    pub fn reference(&mut self, id: RecordId) -> Reference {
        let reference = Reference::new(self.index.lookup(&id).map(str::to_string), id);
        if !reference.is_resolved() {
            debug!("id {} is not indexed; reference left unresolved", reference.id);
            self.unresolved += 1;
        }
        reference
    }
}
