//! Backend-neutral item representation
//!
//! An [`Item`] is the wire form of an entity: a flat map of attribute name to
//! typed [`AttrValue`]. Backends translate this to their native encoding
//! (the DynamoDB backend maps it onto `aws_sdk_dynamodb::types::AttributeValue`).

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::schema::{ATTR_PK, ATTR_SK};

/// A typed attribute value
///
/// Numbers are carried as their decimal string form, matching the wide-column
/// wire format and avoiding binary float artifacts.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// String
    S(String),
    /// Number (decimal string form)
    N(String),
    /// Boolean
    Bool(bool),
    /// List
    L(Vec<AttrValue>),
    /// Map
    M(HashMap<String, AttrValue>),
    /// Explicit null
    Null,
}

impl AttrValue {
    /// Build a string value
    pub fn s(value: impl Into<String>) -> Self {
        Self::S(value.into())
    }

    /// Build a number value from an i64
    pub fn n_i64(value: i64) -> Self {
        Self::N(value.to_string())
    }

    /// Build a number value from an f64
    ///
    /// Goes through the decimal string form to avoid binary float artifacts.
    pub fn n_f64(value: f64) -> Self {
        Self::N(value.to_string())
    }

    /// String payload, if this is a string value
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    /// Raw numeric string, if this is a number value
    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    /// Parse as i64, if this is a number value
    pub fn as_i64(&self) -> Option<i64> {
        self.as_n().and_then(|n| n.parse().ok())
    }

    /// Parse as f64, if this is a number value
    pub fn as_f64(&self) -> Option<f64> {
        self.as_n().and_then(|n| n.parse().ok())
    }

    /// Boolean payload, if this is a boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert a JSON value to an attribute value
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::N(n.to_string()),
            serde_json::Value::String(s) => Self::S(s.clone()),
            serde_json::Value::Array(arr) => Self::L(arr.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(obj) => Self::M(obj
                .iter()
                .map(|(k, v)| (k.clone(), Self::from_json(v)))
                .collect()),
        }
    }

    /// Convert an attribute value back to JSON
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::N(n) => {
                if let Ok(i) = n.parse::<i64>() {
                    serde_json::Value::Number(i.into())
                } else if let Some(f) = n
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                {
                    serde_json::Value::Number(f)
                } else {
                    serde_json::Value::String(n.clone())
                }
            }
            Self::S(s) => serde_json::Value::String(s.clone()),
            Self::L(list) => serde_json::Value::Array(list.iter().map(Self::to_json).collect()),
            Self::M(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// Wire form of an entity: attribute name → typed value
pub type Item = HashMap<String, AttrValue>;

/// Composite primary key of an item
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    /// Partition key
    pub pk: String,
    /// Sort key
    pub sk: String,
}

impl ItemKey {
    /// Build a key from its parts
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }

    /// Extract the primary key from an item
    pub fn of(item: &Item) -> Result<Self> {
        let pk = item
            .get(ATTR_PK)
            .and_then(AttrValue::as_s)
            .ok_or_else(|| Error::corrupt("item missing pk"))?;
        let sk = item
            .get(ATTR_SK)
            .and_then(AttrValue::as_s)
            .ok_or_else(|| Error::corrupt("item missing sk"))?;
        Ok(Self::new(pk, sk))
    }
}

/// Accessor helpers for reading typed attributes off an [`Item`]
pub trait ItemExt {
    /// String attribute, if present
    fn get_s(&self, attr: &str) -> Option<&str>;
    /// i64 attribute, if present and numeric
    fn get_i64(&self, attr: &str) -> Option<i64>;
    /// f64 attribute, if present and numeric
    fn get_f64(&self, attr: &str) -> Option<f64>;
    /// Boolean attribute, if present
    fn get_bool(&self, attr: &str) -> Option<bool>;
    /// Attribute as JSON, if present
    fn get_json(&self, attr: &str) -> Option<serde_json::Value>;
    /// String attribute, or a corrupt-item error naming the attribute
    fn require_s(&self, attr: &str) -> Result<&str>;
}

impl ItemExt for Item {
    fn get_s(&self, attr: &str) -> Option<&str> {
        self.get(attr).and_then(AttrValue::as_s)
    }

    fn get_i64(&self, attr: &str) -> Option<i64> {
        self.get(attr).and_then(AttrValue::as_i64)
    }

    fn get_f64(&self, attr: &str) -> Option<f64> {
        self.get(attr).and_then(AttrValue::as_f64)
    }

    fn get_bool(&self, attr: &str) -> Option<bool> {
        self.get(attr).and_then(AttrValue::as_bool)
    }

    fn get_json(&self, attr: &str) -> Option<serde_json::Value> {
        self.get(attr).map(AttrValue::to_json)
    }

    fn require_s(&self, attr: &str) -> Result<&str> {
        self.get_s(attr)
            .ok_or_else(|| Error::corrupt(format!("missing attribute {attr}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_preserves_structure() {
        let json = serde_json::json!({
            "name": "azure migration",
            "score": 3.5,
            "count": 7,
            "open": true,
            "tags": ["cloud", "iaas"],
            "nested": {"a": null}
        });
        let attr = AttrValue::from_json(&json);
        assert_eq!(attr.to_json(), json);
    }

    #[test]
    fn numbers_carry_decimal_strings() {
        assert_eq!(AttrValue::n_f64(0.1).as_n(), Some("0.1"));
        assert_eq!(AttrValue::n_i64(-42).as_i64(), Some(-42));
    }

    #[test]
    fn item_key_extraction_requires_both_parts() {
        let mut item = Item::new();
        item.insert(ATTR_PK.to_string(), AttrValue::s("ASSESSMENT#TRA-2025-A1B2C3"));
        assert!(ItemKey::of(&item).is_err());

        item.insert(ATTR_SK.to_string(), AttrValue::s("METADATA"));
        let key = ItemKey::of(&item).unwrap();
        assert_eq!(key.pk, "ASSESSMENT#TRA-2025-A1B2C3");
        assert_eq!(key.sk, "METADATA");
    }
}
