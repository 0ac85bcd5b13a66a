//! Attribute-value codec
//!
//! Maps the backend-neutral [`AttrValue`] onto the SDK's `AttributeValue`.
//! Binary and set types have no counterpart in the entity model and are
//! skipped on decode.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;

use tra_db_core::item::{AttrValue, Item};

/// Convert a neutral value to the SDK representation
pub fn to_dynamo(value: &AttrValue) -> AttributeValue {
    match value {
        AttrValue::S(s) => AttributeValue::S(s.clone()),
        AttrValue::N(n) => AttributeValue::N(n.clone()),
        AttrValue::Bool(b) => AttributeValue::Bool(*b),
        AttrValue::L(list) => AttributeValue::L(list.iter().map(to_dynamo).collect()),
        AttrValue::M(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_dynamo(v)))
                .collect(),
        ),
        AttrValue::Null => AttributeValue::Null(true),
    }
}

/// Convert an SDK value back; unsupported types yield `None`
pub fn from_dynamo(value: &AttributeValue) -> Option<AttrValue> {
    match value {
        AttributeValue::S(s) => Some(AttrValue::S(s.clone())),
        AttributeValue::N(n) => Some(AttrValue::N(n.clone())),
        AttributeValue::Bool(b) => Some(AttrValue::Bool(*b)),
        AttributeValue::L(list) => Some(AttrValue::L(
            list.iter().filter_map(from_dynamo).collect(),
        )),
        AttributeValue::M(map) => Some(AttrValue::M(
            map.iter()
                .filter_map(|(k, v)| from_dynamo(v).map(|av| (k.clone(), av)))
                .collect(),
        )),
        AttributeValue::Null(_) => Some(AttrValue::Null),
        _ => None, // binary and set types
    }
}

/// Convert a whole item to the SDK representation
pub fn to_dynamo_item(item: &Item) -> HashMap<String, AttributeValue> {
    item.iter()
        .map(|(k, v)| (k.clone(), to_dynamo(v)))
        .collect()
}

/// Convert a stored SDK item back to the neutral representation
pub fn from_dynamo_item(item: &HashMap<String, AttributeValue>) -> Item {
    item.iter()
        .filter_map(|(k, v)| from_dynamo(v).map(|av| (k.clone(), av)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_supported_types() {
        let mut item = Item::new();
        item.insert("pk".into(), AttrValue::s("DOC#d1"));
        item.insert("file_size".into(), AttrValue::n_i64(4096));
        item.insert("processed".into(), AttrValue::Bool(false));
        item.insert(
            "tags".into(),
            AttrValue::L(vec![AttrValue::s("cloud"), AttrValue::s("iaas")]),
        );

        let converted = to_dynamo_item(&item);
        assert_eq!(from_dynamo_item(&converted), item);
    }

    #[test]
    fn unsupported_types_are_skipped() {
        let mut raw = HashMap::new();
        raw.insert("pk".to_string(), AttributeValue::S("DOC#d1".into()));
        raw.insert(
            "blob".to_string(),
            AttributeValue::B(aws_smithy_types::Blob::new(b"bytes".to_vec())),
        );

        let item = from_dynamo_item(&raw);
        assert_eq!(item.len(), 1);
        assert!(item.contains_key("pk"));
    }
}
