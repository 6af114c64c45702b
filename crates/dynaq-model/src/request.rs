//! The two read shapes the traversal engine issues, and the page they return.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attribute_value::{AttributeValue, Item};

/// A key-conditioned read, optionally against a secondary index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryRequest {
    /// The table to query.
    pub table_name: String,

    /// The secondary index to query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,

    /// Key condition in placeholder form.
    pub key_condition_expression: String,

    /// Filter applied to matched items before they are returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,

    /// `#name` placeholders to attribute names.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,

    /// `:name` placeholders to values.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,

    /// Maximum number of items evaluated per page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,

    /// Cursor to resume from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_start_key: Option<Item>,
}

/// An unconditioned read over a whole table or index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanRequest {
    /// The table to scan.
    pub table_name: String,

    /// The secondary index to scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,

    /// Filter applied to scanned items before they are returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,

    /// `#name` placeholders to attribute names.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,

    /// `:name` placeholders to values.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,

    /// Maximum number of items evaluated per page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,

    /// Cursor to resume from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_start_key: Option<Item>,
}

/// Either read shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReadRequest {
    /// Indexed read.
    Query(QueryRequest),
    /// Full sweep.
    Scan(ScanRequest),
}

impl ReadRequest {
    /// Returns `true` for the key-conditioned shape.
    #[must_use]
    pub fn is_query(&self) -> bool {
        matches!(self, Self::Query(_))
    }

    /// Replace the resume cursor.
    pub fn set_exclusive_start_key(&mut self, cursor: Option<Item>) {
        match self {
            Self::Query(q) => q.exclusive_start_key = cursor,
            Self::Scan(s) => s.exclusive_start_key = cursor,
        }
    }

    /// Returns this request with the given resume cursor.
    #[must_use]
    pub fn with_exclusive_start_key(mut self, cursor: Option<Item>) -> Self {
        self.set_exclusive_start_key(cursor);
        self
    }

    /// Placeholder name map of either shape.
    #[must_use]
    pub fn expression_attribute_names(&self) -> &HashMap<String, String> {
        match self {
            Self::Query(q) => &q.expression_attribute_names,
            Self::Scan(s) => &s.expression_attribute_names,
        }
    }

    /// Placeholder value map of either shape.
    #[must_use]
    pub fn expression_attribute_values(&self) -> &HashMap<String, AttributeValue> {
        match self {
            Self::Query(q) => &q.expression_attribute_values,
            Self::Scan(s) => &s.expression_attribute_values,
        }
    }
}

/// One page of read results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Page {
    /// Items in store order.
    #[serde(default)]
    pub items: Vec<Item>,
    /// Where the next page resumes; absent on the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_evaluated_key: Option<Item>,
}
