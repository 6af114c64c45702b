//! DynamoDB model types for dynaq.
//!
//! This crate holds the wire-level shapes shared between the query compiler,
//! the traversal engine, and whatever executes reads against the store. The
//! types serialize to DynamoDB's JSON protocol so that records and requests can
//! be written to files or printed verbatim.
// "DynamoDB" appears in virtually every doc comment in this crate.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod attribute_value;
pub mod request;
pub mod types;

pub use attribute_value::{AttributeValue, Item};
pub use request::{Page, QueryRequest, ReadRequest, ScanRequest};
pub use types::{
    AttributeDefinition, KeyAttribute, KeySchema, KeySchemaElement, KeyType,
    ScalarAttributeType, SchemaError, TableSchema,
};
