//! Clause-by-clause rewriting of shorthand filters into placeholder form.
//!
//! The input is split on `AND` / `OR` (kept as their own segments), then every
//! clause is matched against an ordered list of shapes. The first shape that
//! matches wins; a clause that matches none is emitted verbatim, on the
//! assumption that it is already written in the store's native syntax.
//!
//! | Shape | Emitted |
//! |-------|---------|
//! | `attribute_exists(a)` / `attribute_not_exists(a)` | `attribute_exists(#a)` |
//! | `begins_with(a, v)` / `contains(a, v)` | `begins_with(#a, :a)` |
//! | `between(a, v1, v2)` | `#a BETWEEN :a_between1 AND :a_between2` |
//! | `size(a) op v` | `size(#a) op :a_size` |
//! | `a IN (v0, v1, ...)` | `#a IN (:a_in0, :a_in1, ...)` |
//! | `a op v` | `#a op :a` |
//!
//! In every shape `a` is a plain identifier (`[A-Za-z_][A-Za-z0-9_]*`).
//! Names containing `-`, nested paths such as `info.rating` and list indexes
//! never match, so their clauses pass through verbatim and must already use
//! native placeholders supplied by the caller.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::literal::{Literal, parse_literal};

/// Value placeholder key (without the leading `:`) to literal.
pub type FilterAttributes = BTreeMap<String, Literal>;

/// Result of normalizing one filter expression.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedFilter {
    /// The expression in placeholder form.
    pub expression: String,
    /// Attribute names rewritten to `#name` placeholders.
    pub names: BTreeSet<String>,
    /// Literals rewritten to `:key` placeholders.
    pub attributes: FilterAttributes,
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

const NAME: &str = r"[A-Za-z_][A-Za-z0-9_]*";
const OPERATOR: &str = r"(<=|>=|!=|<>|=|<|>)";

static SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(and|or)\s+").expect("valid separator regex"));
static GROUP_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:\(\s*|not\s+)").expect("valid group regex"));
static FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(attribute_exists|attribute_not_exists|begins_with|contains|between)\s*\((.*)\)$",
    )
    .expect("valid function regex")
});
static SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)^size\s*\(\s*({NAME})\s*\)\s*{OPERATOR}\s*(.+)$"))
        .expect("valid size regex")
});
static IN_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)^({NAME})\s+in\s*\((.*)\)$")).expect("valid in regex")
});
static COMPARISON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^({NAME})\s*{OPERATOR}\s*(.+)$")).expect("valid comparison regex")
});
static BARE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{NAME}$")).expect("valid name regex"));
static VALUE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:[A-Za-z0-9_]+$").expect("valid placeholder regex"));

// ---------------------------------------------------------------------------
// Clause shapes
// ---------------------------------------------------------------------------

/// Comparison operators accepted in shorthand clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(Self::Eq),
            "!=" | "<>" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            _ => None,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        })
    }
}

/// One recognized clause, borrowing from the input.
#[derive(Debug, Clone, PartialEq)]
enum Clause<'a> {
    Exists { negated: bool, attr: &'a str },
    BeginsWith { attr: &'a str, value: &'a str },
    Contains { attr: &'a str, value: &'a str },
    Between { attr: &'a str, low: &'a str, high: &'a str },
    Size { attr: &'a str, op: CompareOp, value: &'a str },
    In { attr: &'a str, values: Vec<&'a str> },
    Comparison { attr: &'a str, op: CompareOp, value: &'a str },
    PassThrough(&'a str),
}

impl<'a> Clause<'a> {
    fn recognize(text: &'a str) -> Self {
        Self::function(text)
            .or_else(|| Self::size(text))
            .or_else(|| Self::in_list(text))
            .or_else(|| Self::comparison(text))
            .unwrap_or(Self::PassThrough(text))
    }

    fn function(text: &'a str) -> Option<Self> {
        let caps = FUNCTION.captures(text)?;
        let function = caps.get(1)?.as_str().to_ascii_lowercase();
        let args = split_arguments(caps.get(2)?.as_str());
        if args.is_empty() || args.iter().any(|a| a.is_empty()) || !BARE_NAME.is_match(args[0]) {
            return None;
        }

        match (function.as_str(), args.as_slice()) {
            ("attribute_exists", &[attr]) => Some(Self::Exists {
                negated: false,
                attr,
            }),
            ("attribute_not_exists", &[attr]) => Some(Self::Exists {
                negated: true,
                attr,
            }),
            ("begins_with", &[attr, value]) => Some(Self::BeginsWith { attr, value }),
            ("contains", &[attr, value]) => Some(Self::Contains { attr, value }),
            ("between", &[attr, low, high]) => Some(Self::Between { attr, low, high }),
            _ => None,
        }
    }

    fn size(text: &'a str) -> Option<Self> {
        let caps = SIZE.captures(text)?;
        Some(Self::Size {
            attr: caps.get(1)?.as_str(),
            op: CompareOp::from_symbol(caps.get(2)?.as_str())?,
            value: caps.get(3)?.as_str().trim(),
        })
    }

    fn in_list(text: &'a str) -> Option<Self> {
        let caps = IN_LIST.captures(text)?;
        let values = split_arguments(caps.get(2)?.as_str());
        if values.is_empty() || values.iter().any(|v| v.is_empty()) {
            return None;
        }
        Some(Self::In {
            attr: caps.get(1)?.as_str(),
            values,
        })
    }

    fn comparison(text: &'a str) -> Option<Self> {
        let caps = COMPARISON.captures(text)?;
        Some(Self::Comparison {
            attr: caps.get(1)?.as_str(),
            op: CompareOp::from_symbol(caps.get(2)?.as_str())?,
            value: caps.get(3)?.as_str().trim(),
        })
    }
}

// ---------------------------------------------------------------------------
// Rewriting
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Normalizer {
    names: BTreeSet<String>,
    attributes: FilterAttributes,
}

impl Normalizer {
    fn rewrite(&mut self, element: &str) -> String {
        let (prefix, core, suffix) = peel_grouping(element.trim());
        let rendered = self.render(Clause::recognize(core));
        format!("{prefix}{rendered}{suffix}")
    }

    fn render(&mut self, clause: Clause<'_>) -> String {
        match clause {
            Clause::Exists { negated, attr } => {
                let function = if negated {
                    "attribute_not_exists"
                } else {
                    "attribute_exists"
                };
                format!("{function}({})", self.name(attr))
            }
            Clause::BeginsWith { attr, value } => {
                let name = self.name(attr);
                format!("begins_with({name}, {})", self.value(attr, value))
            }
            Clause::Contains { attr, value } => {
                let name = self.name(attr);
                format!("contains({name}, {})", self.value(attr, value))
            }
            Clause::Between { attr, low, high } => {
                let name = self.name(attr);
                let low = self.value(&format!("{attr}_between1"), low);
                let high = self.value(&format!("{attr}_between2"), high);
                format!("{name} BETWEEN {low} AND {high}")
            }
            Clause::Size { attr, op, value } => {
                let name = self.name(attr);
                let value = self.value(&format!("{attr}_size"), value);
                format!("size({name}) {op} {value}")
            }
            Clause::In { attr, values } => {
                let name = self.name(attr);
                let placeholders: Vec<String> = values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| self.value(&format!("{attr}_in{i}"), v))
                    .collect();
                format!("{name} IN ({})", placeholders.join(", "))
            }
            Clause::Comparison { attr, op, value } => {
                let name = self.name(attr);
                format!("{name} {op} {}", self.value(attr, value))
            }
            Clause::PassThrough(text) => text.to_owned(),
        }
    }

    fn name(&mut self, attr: &str) -> String {
        self.names.insert(attr.to_owned());
        format!("#{attr}")
    }

    /// Bind `raw` under `key`, or under `key_<n>` when `key` already holds a
    /// different literal. Existing `:placeholders` are kept as written.
    fn value(&mut self, key: &str, raw: &str) -> String {
        if VALUE_PLACEHOLDER.is_match(raw) {
            return raw.to_owned();
        }

        let literal = parse_literal(raw);
        let mut candidate = key.to_owned();
        let mut suffix = 0usize;
        loop {
            match self.attributes.get(&candidate) {
                Some(existing) if *existing != literal => {
                    suffix += 1;
                    candidate = format!("{key}_{suffix}");
                }
                Some(_) => return format!(":{candidate}"),
                None => break,
            }
        }
        self.attributes.insert(candidate.clone(), literal);
        format!(":{candidate}")
    }
}

/// Rewrite a shorthand filter into placeholder form.
///
/// Never fails: clauses that match no known shape are kept as written.
#[must_use]
pub fn normalize(expr: &str) -> NormalizedFilter {
    let mut normalizer = Normalizer::default();
    let parts: Vec<String> = split_clauses(expr)
        .into_iter()
        .map(|segment| match segment {
            Segment::Separator(separator) => separator.to_owned(),
            Segment::Clause(text) => normalizer.rewrite(text),
        })
        .collect();

    NormalizedFilter {
        expression: parts.join(" "),
        names: normalizer.names,
        attributes: normalizer.attributes,
    }
}

// ---------------------------------------------------------------------------
// Lexical helpers
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Clause(&'a str),
    Separator(&'a str),
}

/// Split on whitespace-delimited `AND` / `OR` outside quoted literals,
/// keeping the separators as written.
fn split_clauses(input: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut start = 0;
    for caps in SEPARATOR.captures_iter(input) {
        let (Some(whole), Some(separator)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() < start || inside_quotes(&input[..whole.start()]) {
            continue;
        }
        segments.push(Segment::Clause(&input[start..whole.start()]));
        segments.push(Segment::Separator(separator.as_str()));
        start = whole.end();
    }
    segments.push(Segment::Clause(&input[start..]));
    segments
}

/// Returns `true` if a quote opened in `prefix` is still open at its end.
fn inside_quotes(prefix: &str) -> bool {
    let mut open: Option<char> = None;
    for ch in prefix.chars() {
        match open {
            Some(q) if ch == q => open = None,
            Some(_) => {}
            None if ch == '\'' || ch == '"' => open = Some(ch),
            None => {}
        }
    }
    open.is_some()
}

/// Split a parenthesized argument list on top-level commas, trimming each
/// argument. Commas inside quotes or nested parentheses are not separators.
pub(crate) fn split_arguments(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut open: Option<char> = None;
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in input.char_indices() {
        match (open, ch) {
            (Some(q), c) if c == q => open = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => open = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(input[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = input[start..].trim();
    if !(parts.is_empty() && last.is_empty()) {
        parts.push(last);
    }
    parts
}

/// Separate leading `(` / `NOT` and unmatched trailing `)` from a clause so
/// grouped clauses are still recognized. Returns `(prefix, core, suffix)`.
fn peel_grouping(element: &str) -> (&str, &str, &str) {
    let mut core = element;
    while let Some(m) = GROUP_PREFIX.find(core) {
        core = &core[m.end()..];
    }
    let prefix = &element[..element.len() - core.len()];

    let mut inner = core;
    let mut surplus = paren_surplus(core);
    while surplus > 0 {
        let Some(stripped) = inner.trim_end().strip_suffix(')') else {
            break;
        };
        inner = stripped;
        surplus -= 1;
    }
    let inner = inner.trim_end();
    (prefix, inner, &core[inner.len()..])
}

/// Number of `)` not matched by a preceding `(`, ignoring quoted text.
fn paren_surplus(text: &str) -> usize {
    let mut open: Option<char> = None;
    let mut depth = 0usize;
    let mut surplus = 0usize;
    for ch in text.chars() {
        match (open, ch) {
            (Some(q), c) if c == q => open = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => open = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') if depth > 0 => depth -= 1,
            (None, ')') => surplus += 1,
            _ => {}
        }
    }
    surplus
}
