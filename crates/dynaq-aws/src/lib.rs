//! DynamoDB execution collaborator for dynaq.
//!
//! [`DynamoClient`] wraps an `aws-sdk-dynamodb` client and implements the
//! core's [`ReadExecutor`](dynaq_core::ReadExecutor) and
//! [`KeySchemaProvider`](dynaq_core::KeySchemaProvider) traits. [`BatchWriter`]
//! puts and deletes records in batches.
#![allow(clippy::doc_markdown)]

pub mod client;
pub mod convert;
pub mod error;
pub mod writer;

pub use client::DynamoClient;
pub use error::AwsError;
pub use writer::{BatchWriter, key_of};
