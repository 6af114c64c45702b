//! Shorthand filter expressions.
//!
//! Operators write filters such as `age > 18 AND status IN ('a', 'b')`. The
//! store only accepts expressions whose attribute names and literal values are
//! replaced by `#name` / `:value` placeholders, so [`normalize`] rewrites each
//! boolean clause independently and collects the literals it lifts out.
//! Clauses it does not recognize are passed through untouched.

pub mod literal;
pub mod normalizer;

pub use literal::{Literal, parse_literal};
pub use normalizer::{FilterAttributes, NormalizedFilter, normalize};
