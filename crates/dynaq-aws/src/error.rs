//! Errors raised by the DynamoDB collaborator.

use dynaq_model::SchemaError;

/// Errors from talking to DynamoDB.
#[derive(Debug, thiserror::Error)]
pub enum AwsError {
    /// The SDK returned an attribute value variant this client does not know.
    #[error("unsupported attribute value in response")]
    UnsupportedAttribute,

    /// `DescribeTable` returned no usable description.
    #[error("table {table} has no key schema in its description")]
    MissingKeySchema {
        /// Table name.
        table: String,
    },

    /// An item lacks one of its table's key attributes.
    #[error("item is missing key attribute {attribute}")]
    MissingKeyAttribute {
        /// Key attribute name.
        attribute: String,
    },

    /// Writes were still unprocessed after the last retry.
    #[error("{count} writes to {table} still unprocessed after {attempts} attempts")]
    Unprocessed {
        /// Table name.
        table: String,
        /// Number of writes left over.
        count: usize,
        /// Attempts made.
        attempts: u32,
    },

    /// Key schema conversion failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// An SDK request could not be built.
    #[error("invalid request: {0}")]
    Build(#[from] aws_sdk_dynamodb::error::BuildError),

    /// SDK or transport failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
