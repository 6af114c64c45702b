//! Key schema types.
//!
//! The store describes keys as a list of `KeySchemaElement`s plus a list of
//! `AttributeDefinition`s carrying the scalar type of each key attribute.
//! [`KeySchema`] folds both into the partition/sort pair the query compiler
//! works with, and [`TableSchema`] groups the table's own schema with those of
//! its secondary indexes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Wire enums
// ---------------------------------------------------------------------------

/// Key type within a key schema element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// Partition key.
    #[serde(rename = "HASH")]
    Hash,
    /// Sort key.
    #[serde(rename = "RANGE")]
    Range,
}

impl KeyType {
    /// Returns the wire-format string of this key type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hash => "HASH",
            Self::Range => "RANGE",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar types a key attribute may have.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarAttributeType {
    /// String.
    #[default]
    S,
    /// Number.
    N,
    /// Binary.
    B,
}

impl ScalarAttributeType {
    /// Returns the wire-format string of this type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S => "S",
            Self::N => "N",
            Self::B => "B",
        }
    }
}

impl fmt::Display for ScalarAttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Wire structs
// ---------------------------------------------------------------------------

/// One element of a table or index key schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeySchemaElement {
    /// The key attribute name.
    pub attribute_name: String,
    /// Whether the attribute is the partition or the sort key.
    pub key_type: KeyType,
}

/// Declared scalar type of an attribute that participates in a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeDefinition {
    /// The attribute name.
    pub attribute_name: String,
    /// The attribute's scalar type.
    pub attribute_type: ScalarAttributeType,
}

// ---------------------------------------------------------------------------
// Resolved key schema
// ---------------------------------------------------------------------------

/// A key attribute with its scalar type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyAttribute {
    /// The attribute name.
    pub name: String,
    /// The scalar type used to encode key values.
    pub attr_type: ScalarAttributeType,
}

impl KeyAttribute {
    /// A string-typed key attribute.
    #[must_use]
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attr_type: ScalarAttributeType::S,
        }
    }

    /// A number-typed key attribute.
    #[must_use]
    pub fn number(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attr_type: ScalarAttributeType::N,
        }
    }
}

/// Partition key plus optional sort key of a table or index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySchema {
    /// Partition (HASH) key.
    pub partition_key: KeyAttribute,
    /// Sort (RANGE) key, if the table declares one.
    pub sort_key: Option<KeyAttribute>,
}

impl KeySchema {
    /// Schema with only a partition key.
    #[must_use]
    pub fn new(partition_key: KeyAttribute) -> Self {
        Self {
            partition_key,
            sort_key: None,
        }
    }

    /// Adds a sort key.
    #[must_use]
    pub fn with_sort_key(mut self, sort_key: KeyAttribute) -> Self {
        self.sort_key = Some(sort_key);
        self
    }

    /// Build a key schema from the store's description.
    ///
    /// Attributes without a matching definition default to `S`.
    pub fn from_elements(
        elements: &[KeySchemaElement],
        definitions: &[AttributeDefinition],
    ) -> Result<Self, SchemaError> {
        let resolve = |name: &str| KeyAttribute {
            name: name.to_owned(),
            attr_type: definitions
                .iter()
                .find(|d| d.attribute_name == name)
                .map_or(ScalarAttributeType::S, |d| d.attribute_type),
        };

        let partition_key = elements
            .iter()
            .find(|e| e.key_type == KeyType::Hash)
            .map(|e| resolve(&e.attribute_name))
            .ok_or(SchemaError::MissingPartitionKey)?;
        let sort_key = elements
            .iter()
            .find(|e| e.key_type == KeyType::Range)
            .map(|e| resolve(&e.attribute_name));

        Ok(Self {
            partition_key,
            sort_key,
        })
    }

    /// Names of the primary key attributes, partition key first.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.partition_key.name.as_str())
            .chain(self.sort_key.as_ref().map(|k| k.name.as_str()))
    }
}

/// Key schemas of a table and its secondary indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    /// Table name.
    pub table_name: String,
    /// The table's primary key.
    pub key_schema: KeySchema,
    /// Global and local secondary index key schemas by index name.
    #[serde(default)]
    pub indexes: BTreeMap<String, KeySchema>,
}

impl TableSchema {
    /// The key schema to compile against: the named index's, or the table's.
    pub fn key_schema_for(&self, index: Option<&str>) -> Result<&KeySchema, SchemaError> {
        match index {
            None => Ok(&self.key_schema),
            Some(name) => self
                .indexes
                .get(name)
                .ok_or_else(|| SchemaError::UnknownIndex {
                    table: self.table_name.clone(),
                    index: name.to_owned(),
                }),
        }
    }
}

/// Errors raised while resolving key schemas.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The key schema has no HASH element.
    #[error("key schema has no partition (HASH) key")]
    MissingPartitionKey,
    /// The requested secondary index does not exist on the table.
    #[error("table {table} has no index named {index}")]
    UnknownIndex {
        /// Table name.
        table: String,
        /// Requested index name.
        index: String,
    },
}
