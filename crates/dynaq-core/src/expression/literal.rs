//! Literal type inference for values written inline in filters.

use std::fmt;
use std::sync::LazyLock;

use dynaq_model::AttributeValue;
use regex::Regex;
use serde::Serialize;

static INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+$").expect("valid integer regex"));
static FLOAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+\.\d+$").expect("valid float regex"));

/// A typed literal lifted out of a filter expression.
///
/// Numbers keep their source text so no precision is lost on the way to the
/// store, which accepts up to 38 significant digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    /// `true` / `false`.
    Bool(bool),
    /// `null`.
    Null,
    /// Whole number as written, e.g. `18` or `-3`.
    Integer(String),
    /// Decimal number as written, e.g. `1.50`.
    Float(String),
    /// Anything else, with one layer of matching quotes removed.
    String(String),
}

impl Literal {
    /// Encode as the store's attribute value.
    #[must_use]
    pub fn to_attribute_value(&self) -> AttributeValue {
        match self {
            Self::Bool(b) => AttributeValue::Bool(*b),
            Self::Null => AttributeValue::Null(true),
            Self::Integer(n) | Self::Float(n) => AttributeValue::N(n.clone()),
            Self::String(s) => AttributeValue::S(s.clone()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => f.write_str("null"),
            Self::Integer(n) | Self::Float(n) => f.write_str(n),
            Self::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// Infer the type of an inline literal.
///
/// `true`/`false` become booleans, `null` becomes null, `-?\d+` an integer,
/// `-?\d+\.\d+` a float. Everything else is a string after stripping one
/// layer of matching single or double quotes, so `'18'` stays the string
/// `"18"`.
#[must_use]
pub fn parse_literal(raw: &str) -> Literal {
    let token = raw.trim();
    match token {
        "true" => return Literal::Bool(true),
        "false" => return Literal::Bool(false),
        "null" => return Literal::Null,
        _ => {}
    }

    if INTEGER.is_match(token) {
        return Literal::Integer(token.to_owned());
    }
    if FLOAT.is_match(token) {
        return Literal::Float(token.to_owned());
    }

    Literal::String(strip_quotes(token).to_owned())
}

/// Remove one layer of matching surrounding `'` or `"` quotes.
pub(crate) fn strip_quotes(token: &str) -> &str {
    for quote in ['\'', '"'] {
        if token.len() >= 2 && token.starts_with(quote) && token.ends_with(quote) {
            return &token[1..token.len() - 1];
        }
    }
    token
}
