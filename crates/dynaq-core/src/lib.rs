//! Query compiler and paginated traversal engine for dynaq.
//!
//! The pipeline is:
//!
//! 1. **Compile**: [`compiler::compile`] turns the raw partition-key, sort-key,
//!    index and filter tokens into a [`CompiledQuery`].
//! 2. **Normalize**: the filter token is rewritten by
//!    [`expression::normalize`] into placeholder form plus a value table.
//! 3. **Traverse**: [`traversal::traverse`] plans the read (indexed read or full
//!    sweep) and lazily follows continuation cursors through a
//!    [`ReadExecutor`], yielding one record at a time.
//!
//! Nothing in this crate performs network I/O or logs; failures are returned
//! as typed errors.
#![allow(clippy::doc_markdown)]

pub mod compiler;
pub mod config;
pub mod error;
pub mod expression;
pub mod schema;
pub mod traversal;

pub use compiler::{CompiledQuery, KeyClause, KeyOperator, QueryTokens, compile};
pub use config::DynaqConfig;
pub use error::{CompileError, TraversalError};
pub use expression::{FilterAttributes, Literal, NormalizedFilter, normalize, parse_literal};
pub use schema::KeySchemaProvider;
pub use traversal::{ReadExecutor, ReadOptions, plan_read, traverse};
