use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::error::{Error, Result};
use crate::vector::Vector;

/// Key under which catalog files store an item's embedding.
pub const EMBEDDING_FIELD: &str = "embedding";

/// Product identifier as written in the catalog file.
///
/// Non-negative integers get their own variant; any other JSON number (negative,
/// fractional) is kept as written so it round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    String(String),
    Integer(u64),
    Number(Number),
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemId::String(s) => write!(f, "{}", s),
            ItemId::Integer(i) => write!(f, "{}", i),
            ItemId::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId::String(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId::String(s.to_string())
    }
}

impl From<u64> for ItemId {
    fn from(i: u64) -> Self {
        ItemId::Integer(i)
    }
}

/// A catalog entry as exposed to clients: never carries its embedding.
///
/// Every field of the source record other than `id`, `name`, `image_url` and
/// `embedding` is kept verbatim in `attributes` and serialized flattened, so a
/// listed item has the same shape as the record it was read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    pub image_url: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl CatalogItem {
    #[must_use]
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image_url: image_url.into(),
            attributes: Map::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Why a stored embedding was not accepted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingDefect {
    #[error("expected an array of numbers, found {0}")]
    NotAnArray(&'static str),

    #[error("non-numeric component ({0}) inside embedding")]
    NonNumeric(&'static str),

    #[error("embedding contains a non-finite component")]
    NonFinite,

    #[error("embedding is empty")]
    Empty,

    #[error("embedding has {actual} components, catalog dimension is {expected}")]
    WrongDimension { expected: usize, actual: usize },
}

/// Embedding state of a catalog item.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Embedding {
    #[default]
    Missing,
    Vector(Vector),
}

impl Embedding {
    /// Parse a stored embedding, flattening nested arrays depth-first.
    ///
    /// `null` or an absent field is `Missing`; every other non-array shape is a defect.
    pub fn from_json(value: Option<&Value>) -> std::result::Result<Self, EmbeddingDefect> {
        let value = match value {
            None | Some(Value::Null) => return Ok(Embedding::Missing),
            Some(v) => v,
        };

        if !value.is_array() {
            return Err(EmbeddingDefect::NotAnArray(json_kind(value)));
        }

        let mut data = Vec::new();
        flatten_into(value, &mut data)?;

        if data.is_empty() {
            return Err(EmbeddingDefect::Empty);
        }
        if data.iter().any(|x| !x.is_finite()) {
            return Err(EmbeddingDefect::NonFinite);
        }

        Ok(Embedding::Vector(Vector::new(data)))
    }

    #[inline]
    pub fn as_vector(&self) -> Option<&Vector> {
        match self {
            Embedding::Vector(v) => Some(v),
            Embedding::Missing => None,
        }
    }

    #[inline]
    pub fn is_present(&self) -> bool {
        matches!(self, Embedding::Vector(_))
    }

    #[inline]
    pub fn dim(&self) -> Option<usize> {
        self.as_vector().map(Vector::dim)
    }
}

impl From<Vector> for Embedding {
    fn from(v: Vector) -> Self {
        Embedding::Vector(v)
    }
}

impl From<Option<Vector>> for Embedding {
    fn from(v: Option<Vector>) -> Self {
        v.map_or(Embedding::Missing, Embedding::Vector)
    }
}

impl Serialize for Embedding {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Embedding::Missing => serializer.serialize_none(),
            Embedding::Vector(v) => v.serialize(serializer),
        }
    }
}

fn flatten_into(value: &Value, out: &mut Vec<f32>) -> std::result::Result<(), EmbeddingDefect> {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out)?;
            }
            Ok(())
        }
        Value::Number(n) => {
            let x = n.as_f64().ok_or(EmbeddingDefect::NonFinite)?;
            out.push(x as f32);
            Ok(())
        }
        other => Err(EmbeddingDefect::NonNumeric(json_kind(other))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One record of a catalog file: the item plus its embedding.
///
/// Serializes as the flattened item followed by an `embedding` field that is
/// either a flat array or `null`, which is the augmented catalog file format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogRecord {
    #[serde(flatten)]
    pub item: CatalogItem,
    pub embedding: Embedding,
}

/// A record parsed from a catalog file, with the reason its embedding was
/// dropped if it was malformed.
#[derive(Debug, Clone)]
pub struct ParsedRecord {
    pub record: CatalogRecord,
    pub defect: Option<EmbeddingDefect>,
}

impl CatalogRecord {
    #[must_use]
    pub fn new(item: CatalogItem, embedding: Embedding) -> Self {
        Self { item, embedding }
    }

    /// Parse one JSON record.
    ///
    /// A record that is not an object or lacks `id`, `name` or `image_url` is an
    /// error. A malformed embedding is not: the record is kept as `Missing` and the
    /// defect is reported alongside. With `read_embedding == false` any stored
    /// embedding is ignored.
    pub fn parse(value: Value, read_embedding: bool) -> Result<ParsedRecord> {
        let mut object = match value {
            Value::Object(map) => map,
            other => {
                return Err(Error::Catalog(format!(
                    "expected an object record, found {}",
                    json_kind(&other)
                )))
            }
        };

        let stored = object.remove(EMBEDDING_FIELD);
        let item: CatalogItem = serde_json::from_value(Value::Object(object))
            .map_err(|e| Error::Catalog(format!("malformed record: {}", e)))?;

        let (embedding, defect) = if read_embedding {
            match Embedding::from_json(stored.as_ref()) {
                Ok(embedding) => (embedding, None),
                Err(defect) => (Embedding::Missing, Some(defect)),
            }
        } else {
            (Embedding::Missing, None)
        };

        Ok(ParsedRecord {
            record: CatalogRecord { item, embedding },
            defect,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_embedding_null_and_absent() {
        assert_eq!(Embedding::from_json(None).unwrap(), Embedding::Missing);
        assert_eq!(Embedding::from_json(Some(&Value::Null)).unwrap(), Embedding::Missing);
    }

    #[test]
    fn test_embedding_flattens_nested_arrays() {
        let nested = json!([[0.1, 0.2], [0.3, [0.4]]]);
        let embedding = Embedding::from_json(Some(&nested)).unwrap();
        let v = embedding.as_vector().unwrap();
        assert_eq!(v.dim(), 4);
        assert!((v.as_slice()[3] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_embedding_defects() {
        assert_eq!(
            Embedding::from_json(Some(&json!("0.1,0.2"))),
            Err(EmbeddingDefect::NotAnArray("string"))
        );
        assert_eq!(
            Embedding::from_json(Some(&json!([0.1, "x"]))),
            Err(EmbeddingDefect::NonNumeric("string"))
        );
        assert_eq!(Embedding::from_json(Some(&json!([[], []]))), Err(EmbeddingDefect::Empty));
        assert_eq!(
            Embedding::from_json(Some(&json!([1.0, null]))),
            Err(EmbeddingDefect::NonNumeric("null"))
        );
    }

    #[test]
    fn test_record_keeps_extra_attributes() {
        let parsed = CatalogRecord::parse(
            json!({
                "id": 7,
                "name": "Red Sneaker",
                "category": "shoes",
                "image_url": "https://img.example/7.jpg",
                "price": 59.9,
                "embedding": [1.0, 0.0]
            }),
            true,
        )
        .unwrap();

        let item = &parsed.record.item;
        assert_eq!(item.id, ItemId::Integer(7));
        assert_eq!(item.attributes.get("category"), Some(&json!("shoes")));
        assert!(!item.attributes.contains_key(EMBEDDING_FIELD));
        assert!(parsed.record.embedding.is_present());
        assert!(parsed.defect.is_none());
    }

    #[test]
    fn test_record_ids_of_any_number() {
        let negative = CatalogRecord::parse(json!({"id": -3, "name": "N", "image_url": "u"}), true).unwrap();
        assert_eq!(negative.record.item.id.to_string(), "-3");

        let fractional = CatalogRecord::parse(json!({"id": 2.5, "name": "F", "image_url": "u"}), true).unwrap();
        assert!(matches!(fractional.record.item.id, ItemId::Number(_)));
        assert_eq!(serde_json::to_value(&fractional.record.item).unwrap()["id"], json!(2.5));
    }

    #[test]
    fn test_record_with_bad_embedding_is_kept() {
        let parsed = CatalogRecord::parse(
            json!({"id": "a", "name": "A", "image_url": "u", "embedding": {"x": 1}}),
            true,
        )
        .unwrap();
        assert_eq!(parsed.record.embedding, Embedding::Missing);
        assert_eq!(parsed.defect, Some(EmbeddingDefect::NotAnArray("object")));
    }

    #[test]
    fn test_record_ignores_embedding_when_asked() {
        let parsed = CatalogRecord::parse(
            json!({"id": "a", "name": "A", "image_url": "u", "embedding": [1.0]}),
            false,
        )
        .unwrap();
        assert_eq!(parsed.record.embedding, Embedding::Missing);
    }

    #[test]
    fn test_record_missing_required_field() {
        let err = CatalogRecord::parse(json!({"id": "a", "image_url": "u"}), true).unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));
        assert!(CatalogRecord::parse(json!([1, 2]), true).is_err());
    }

    #[test]
    fn test_record_serializes_augmented_shape() {
        let item = CatalogItem::new("a", "A", "u").with_attribute("price", json!(3));
        let with = serde_json::to_value(CatalogRecord::new(
            item.clone(),
            Embedding::Vector(Vector::new(vec![0.5, 0.5])),
        ))
        .unwrap();
        assert_eq!(with, json!({"id": "a", "name": "A", "image_url": "u", "price": 3, "embedding": [0.5, 0.5]}));

        let without = serde_json::to_value(CatalogRecord::new(item, Embedding::Missing)).unwrap();
        assert_eq!(without["embedding"], Value::Null);
    }
}
