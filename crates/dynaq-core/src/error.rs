//! Error types for query compilation and traversal.

use dynaq_model::ScalarAttributeType;

/// Errors raised while compiling raw tokens.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// A sort condition was given but the key schema has no sort key.
    #[error("sort key condition {token:?} given, but the key schema has no sort key")]
    SortKeyWithoutSchema {
        /// The offending sort token.
        token: String,
    },

    /// A sort condition was given without a partition key value.
    #[error("sort key condition {token:?} requires a partition key value")]
    SortKeyWithoutPartitionKey {
        /// The offending sort token.
        token: String,
    },

    /// The sort token is malformed.
    #[error("invalid sort key condition {token:?}: {message}")]
    Parse {
        /// The offending sort token.
        token: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Errors raised while planning or executing a traversal.
#[derive(Debug, thiserror::Error)]
pub enum TraversalError {
    /// A key clause carries an operator its key cannot use.
    #[error("unsupported operator {operator} on key attribute {attribute}")]
    UnsupportedOperator {
        /// Key attribute name.
        attribute: String,
        /// The operator as written.
        operator: String,
    },

    /// A `between` key clause has no upper bound.
    #[error("between condition on key attribute {attribute} has no upper bound")]
    IncompleteKeyClause {
        /// Key attribute name.
        attribute: String,
    },

    /// A sort key clause without a partition key clause.
    #[error("sort key condition on {attribute} has no partition key condition")]
    OrphanSortKey {
        /// Sort key attribute name.
        attribute: String,
    },

    /// A key value cannot be encoded as its declared type.
    #[error("invalid {attr_type} value for key attribute {attribute}: {message}")]
    InvalidKeyValue {
        /// Key attribute name.
        attribute: String,
        /// Declared scalar type.
        attr_type: ScalarAttributeType,
        /// Why encoding failed.
        message: String,
    },

    /// A filter literal would rebind a key condition placeholder.
    #[error("placeholder {placeholder} is bound to two different values")]
    PlaceholderConflict {
        /// The `:placeholder` in question.
        placeholder: String,
    },

    /// The read operation itself failed.
    #[error(transparent)]
    Read(#[from] anyhow::Error),
}
