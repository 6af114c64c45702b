//! Conversions between dynaq model types and `aws-sdk-dynamodb` types.

use std::collections::HashMap;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types as sdk;
use bytes::Bytes;
use dynaq_model::{
    AttributeDefinition, AttributeValue, Item, KeySchema, KeySchemaElement, KeyType,
    ScalarAttributeType,
};

use crate::error::AwsError;

/// SDK item shape.
pub type SdkItem = HashMap<String, sdk::AttributeValue>;

/// Convert a model value into the SDK's representation.
#[must_use]
pub fn to_sdk(value: AttributeValue) -> sdk::AttributeValue {
    match value {
        AttributeValue::S(s) => sdk::AttributeValue::S(s),
        AttributeValue::N(n) => sdk::AttributeValue::N(n),
        AttributeValue::B(b) => sdk::AttributeValue::B(Blob::new(b.to_vec())),
        AttributeValue::Ss(ss) => sdk::AttributeValue::Ss(ss),
        AttributeValue::Ns(ns) => sdk::AttributeValue::Ns(ns),
        AttributeValue::Bs(bs) => {
            sdk::AttributeValue::Bs(bs.into_iter().map(|b| Blob::new(b.to_vec())).collect())
        }
        AttributeValue::Bool(b) => sdk::AttributeValue::Bool(b),
        AttributeValue::Null(n) => sdk::AttributeValue::Null(n),
        AttributeValue::L(l) => sdk::AttributeValue::L(l.into_iter().map(to_sdk).collect()),
        AttributeValue::M(m) => sdk::AttributeValue::M(to_sdk_item(m)),
    }
}

/// Convert an SDK value into the model's representation.
pub fn from_sdk(value: sdk::AttributeValue) -> Result<AttributeValue, AwsError> {
    Ok(match value {
        sdk::AttributeValue::S(s) => AttributeValue::S(s),
        sdk::AttributeValue::N(n) => AttributeValue::N(n),
        sdk::AttributeValue::B(b) => AttributeValue::B(Bytes::from(b.into_inner())),
        sdk::AttributeValue::Ss(ss) => AttributeValue::Ss(ss),
        sdk::AttributeValue::Ns(ns) => AttributeValue::Ns(ns),
        sdk::AttributeValue::Bs(bs) => AttributeValue::Bs(
            bs.into_iter()
                .map(|b| Bytes::from(b.into_inner()))
                .collect(),
        ),
        sdk::AttributeValue::Bool(b) => AttributeValue::Bool(b),
        sdk::AttributeValue::Null(n) => AttributeValue::Null(n),
        sdk::AttributeValue::L(l) => {
            AttributeValue::L(l.into_iter().map(from_sdk).collect::<Result<_, _>>()?)
        }
        sdk::AttributeValue::M(m) => AttributeValue::M(from_sdk_item(m)?),
        _ => return Err(AwsError::UnsupportedAttribute),
    })
}

/// Convert a whole item (or placeholder map) for the SDK.
#[must_use]
pub fn to_sdk_item(item: Item) -> SdkItem {
    item.into_iter().map(|(k, v)| (k, to_sdk(v))).collect()
}

/// Convert a whole SDK item.
pub fn from_sdk_item(item: SdkItem) -> Result<Item, AwsError> {
    item.into_iter()
        .map(|(k, v)| from_sdk(v).map(|v| (k, v)))
        .collect()
}

/// `None` for an empty map so optional request members are omitted.
pub(crate) fn non_empty<K, V>(map: HashMap<K, V>) -> Option<HashMap<K, V>> {
    (!map.is_empty()).then_some(map)
}

/// Resolve an SDK key schema description into a [`KeySchema`].
pub fn key_schema(
    elements: &[sdk::KeySchemaElement],
    definitions: &[sdk::AttributeDefinition],
) -> Result<KeySchema, AwsError> {
    let elements: Vec<KeySchemaElement> = elements
        .iter()
        .filter_map(|e| {
            let key_type = match e.key_type() {
                sdk::KeyType::Hash => KeyType::Hash,
                sdk::KeyType::Range => KeyType::Range,
                _ => return None,
            };
            Some(KeySchemaElement {
                attribute_name: e.attribute_name().to_owned(),
                key_type,
            })
        })
        .collect();
    let definitions: Vec<AttributeDefinition> = definitions
        .iter()
        .filter_map(|d| {
            let attribute_type = match d.attribute_type() {
                sdk::ScalarAttributeType::S => ScalarAttributeType::S,
                sdk::ScalarAttributeType::N => ScalarAttributeType::N,
                sdk::ScalarAttributeType::B => ScalarAttributeType::B,
                _ => return None,
            };
            Some(AttributeDefinition {
                attribute_name: d.attribute_name().to_owned(),
                attribute_type,
            })
        })
        .collect();

    Ok(KeySchema::from_elements(&elements, &definitions)?)
}
