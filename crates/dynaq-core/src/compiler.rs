//! Compilation of raw key and filter tokens into a [`CompiledQuery`].
//!
//! The partition token is an equality value taken verbatim. The sort token is
//! matched against, in order:
//!
//! 1. `between(A, B)` (case-insensitive)
//! 2. `begins_with(P)`, with one layer of quotes stripped from `P`
//! 3. `<op>[ |:]value` where `op` is one of `<=`, `>=`, `<`, `>`, `=`
//! 4. anything else, as an equality value taken verbatim
//!
//! The filter token goes through [`normalize`].

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use dynaq_model::{KeyAttribute, KeySchema, ScalarAttributeType};
use regex::Regex;
use serde::Serialize;

use crate::error::CompileError;
use crate::expression::literal::strip_quotes;
use crate::expression::normalizer::split_arguments;
use crate::expression::{FilterAttributes, normalize};

static BETWEEN_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^between\s*\(").expect("valid between regex"));
static BEGINS_WITH_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^begins_with\s*\(").expect("valid begins_with regex"));
static OPERATOR_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(<=|>=|<|>|=)[\s:]?(.*)$").expect("valid operator regex"));

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Operators a key condition may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum KeyOperator {
    /// `=`
    #[serde(rename = "=")]
    Eq,
    /// `<`
    #[serde(rename = "<")]
    Lt,
    /// `<=`
    #[serde(rename = "<=")]
    Le,
    /// `>`
    #[serde(rename = ">")]
    Gt,
    /// `>=`
    #[serde(rename = ">=")]
    Ge,
    /// `begins_with`
    #[serde(rename = "begins_with")]
    BeginsWith,
    /// `between`
    #[serde(rename = "between")]
    Between,
}

impl KeyOperator {
    /// The operator as written in a key condition.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::BeginsWith => "begins_with",
            Self::Between => "between",
        }
    }

    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(Self::Eq),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            _ => None,
        }
    }
}

impl fmt::Display for KeyOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A condition on one key attribute.
///
/// Values stay textual; they are encoded by `attr_type` when the read is
/// planned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyClause {
    /// Key attribute name.
    pub name: String,
    /// Declared scalar type of the key attribute.
    pub attr_type: ScalarAttributeType,
    /// Condition operator.
    pub operator: KeyOperator,
    /// Operand, or lower bound for `between`.
    pub value: String,
    /// Upper bound for `between`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value2: Option<String>,
}

impl KeyClause {
    fn new(key: &KeyAttribute, condition: SortCondition) -> Self {
        Self {
            name: key.name.clone(),
            attr_type: key.attr_type,
            operator: condition.operator,
            value: condition.value,
            value2: condition.value2,
        }
    }
}

/// Execution-ready description of a read.
///
/// An empty `CompiledQuery` means a full sweep of the table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledQuery {
    /// Equality condition on the partition key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<KeyClause>,
    /// Condition on the sort key; only present with `partition_key`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<KeyClause>,
    /// Secondary index to read from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    /// Filter in placeholder form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,
    /// Attribute names the filter refers to through `#name`.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub filter_names: BTreeSet<String>,
    /// Literals the filter refers to through `:key`.
    #[serde(skip_serializing_if = "FilterAttributes::is_empty")]
    pub filter_attributes: FilterAttributes,
}

impl CompiledQuery {
    /// Returns `true` when the read is key-conditioned.
    #[must_use]
    pub fn is_indexed_read(&self) -> bool {
        self.partition_key.is_some()
    }
}

/// Raw user input for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTokens {
    /// Partition key value.
    pub partition: Option<String>,
    /// Sort key condition.
    pub sort: Option<String>,
    /// Secondary index name.
    pub index: Option<String>,
    /// Shorthand filter expression.
    pub filter: Option<String>,
}

impl QueryTokens {
    /// Sets the partition key value.
    #[must_use]
    pub fn partition(mut self, value: impl Into<String>) -> Self {
        self.partition = Some(value.into());
        self
    }

    /// Sets the sort key condition.
    #[must_use]
    pub fn sort(mut self, value: impl Into<String>) -> Self {
        self.sort = Some(value.into());
        self
    }

    /// Sets the secondary index name.
    #[must_use]
    pub fn index(mut self, value: impl Into<String>) -> Self {
        self.index = Some(value.into());
        self
    }

    /// Sets the filter expression.
    #[must_use]
    pub fn filter(mut self, value: impl Into<String>) -> Self {
        self.filter = Some(value.into());
        self
    }
}

/// Parsed sort token before it is bound to a key attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortCondition {
    /// Operator.
    pub operator: KeyOperator,
    /// Operand, or lower bound for `between`.
    pub value: String,
    /// Upper bound for `between`.
    pub value2: Option<String>,
}

impl SortCondition {
    fn single(operator: KeyOperator, value: impl Into<String>) -> Self {
        Self {
            operator,
            value: value.into(),
            value2: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// Compile raw tokens against a key schema.
///
/// Fails with [`CompileError::SortKeyWithoutSchema`] when a sort condition is
/// given for a schema without a sort key, and with [`CompileError::Parse`]
/// on a malformed sort condition.
pub fn compile(tokens: &QueryTokens, schema: &KeySchema) -> Result<CompiledQuery, CompileError> {
    let partition_key = tokens.partition.as_deref().map(|value| {
        KeyClause::new(
            &schema.partition_key,
            SortCondition::single(KeyOperator::Eq, value),
        )
    });

    let sort_key = match tokens.sort.as_deref() {
        None => None,
        Some(token) => {
            let Some(sort_attr) = schema.sort_key.as_ref() else {
                return Err(CompileError::SortKeyWithoutSchema {
                    token: token.to_owned(),
                });
            };
            if partition_key.is_none() {
                return Err(CompileError::SortKeyWithoutPartitionKey {
                    token: token.to_owned(),
                });
            }
            Some(KeyClause::new(sort_attr, parse_sort_token(token)?))
        }
    };

    let mut query = CompiledQuery {
        partition_key,
        sort_key,
        index_name: tokens.index.clone(),
        ..CompiledQuery::default()
    };

    if let Some(filter) = tokens.filter.as_deref().filter(|f| !f.trim().is_empty()) {
        let normalized = normalize(filter);
        query.filter_expression = Some(normalized.expression);
        query.filter_names = normalized.names;
        query.filter_attributes = normalized.attributes;
    }

    Ok(query)
}

/// Parse a sort key token into an operator and operand(s).
pub fn parse_sort_token(token: &str) -> Result<SortCondition, CompileError> {
    let trimmed = token.trim();

    if let Some(m) = BETWEEN_CALL.find(trimmed) {
        let args = call_arguments(token, &trimmed[m.end()..])?;
        return match args.as_slice() {
            &[low, high] if !low.is_empty() && !high.is_empty() => Ok(SortCondition {
                operator: KeyOperator::Between,
                value: low.to_owned(),
                value2: Some(high.to_owned()),
            }),
            _ => Err(parse_error(token, "between takes exactly two values")),
        };
    }

    if let Some(m) = BEGINS_WITH_CALL.find(trimmed) {
        let args = call_arguments(token, &trimmed[m.end()..])?;
        return match args.as_slice() {
            &[prefix] if !prefix.is_empty() => Ok(SortCondition::single(
                KeyOperator::BeginsWith,
                strip_quotes(prefix),
            )),
            _ => Err(parse_error(token, "begins_with takes exactly one value")),
        };
    }

    if let Some(caps) = OPERATOR_PREFIX.captures(trimmed) {
        let operator = caps
            .get(1)
            .and_then(|m| KeyOperator::from_symbol(m.as_str()))
            .ok_or_else(|| parse_error(token, "unknown operator"))?;
        let value = caps.get(2).map_or("", |m| m.as_str().trim());
        if value.is_empty() {
            return Err(parse_error(token, "missing value after operator"));
        }
        return Ok(SortCondition::single(operator, value));
    }

    Ok(SortCondition::single(KeyOperator::Eq, token))
}

/// Arguments of a `name(...)` call whose opening parenthesis was consumed.
fn call_arguments<'a>(token: &str, rest: &'a str) -> Result<Vec<&'a str>, CompileError> {
    let inner = rest
        .trim_end()
        .strip_suffix(')')
        .ok_or_else(|| parse_error(token, "missing closing parenthesis"))?;
    Ok(split_arguments(inner))
}

fn parse_error(token: &str, message: &str) -> CompileError {
    CompileError::Parse {
        token: token.to_owned(),
        message: message.to_owned(),
    }
}
