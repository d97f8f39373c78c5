//! `where` clause parsing and evaluation.
//!
//! Only a single comparison is supported: `<field> <op> <literal>`, where
//! `<op>` is one of `=`, `<>`, `!=`, `<`, `<=`, `>`, `>=`. The field may be
//! double-quoted (`"total precip" > 0`) and text literals single-quoted with
//! `''` as the escape for a literal quote. `1=1` (or an empty clause) matches
//! everything. Anything else is rejected rather than silently matching.

use std::cmp::Ordering;
use std::sync::LazyLock;

use feature_server_models::{AttributeValue, Feature, parse_date};
use regex::Regex;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::QueryError;

static COMPARISON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:"([^"]+)"|([A-Za-z_][A-Za-z0-9_.]*))\s*(<=|>=|<>|!=|=|<|>)\s*(.+)$"#)
        .expect("valid regex")
});

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
pub enum Operator {
    /// `=`
    #[strum(serialize = "=")]
    Eq,
    /// `<>` or `!=`
    #[strum(serialize = "<>", serialize = "!=")]
    Ne,
    /// `<`
    #[strum(serialize = "<")]
    Lt,
    /// `<=`
    #[strum(serialize = "<=")]
    Le,
    /// `>`
    #[strum(serialize = ">")]
    Gt,
    /// `>=`
    #[strum(serialize = ">=")]
    Ge,
}

impl Operator {
    const fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => matches!(ordering, Ordering::Equal),
            Self::Ne => !matches!(ordering, Ordering::Equal),
            Self::Lt => matches!(ordering, Ordering::Less),
            Self::Le => !matches!(ordering, Ordering::Greater),
            Self::Gt => matches!(ordering, Ordering::Greater),
            Self::Ge => !matches!(ordering, Ordering::Less),
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Bare numeric literal.
    Number(f64),
    /// Quoted or bare text.
    Text(String),
}

/// `<field> <op> <literal>`
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Attribute name.
    pub field: String,
    /// Operator.
    pub op: Operator,
    /// Value compared against.
    pub literal: Literal,
}

/// Parsed `where` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `1=1`: every feature matches.
    Always,
    /// A single attribute comparison.
    Comparison(Comparison),
}

impl Predicate {
    /// Parses a `where` clause.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnsupportedPredicate`] if the clause is not `1=1`
    /// or a single comparison.
    pub fn parse(clause: &str) -> Result<Self, QueryError> {
        let clause = clause.trim();
        let compact: String = clause.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() || compact == "1=1" {
            return Ok(Self::Always);
        }

        let unsupported = || QueryError::UnsupportedPredicate {
            message: format!("expected '<field> <op> <value>', got '{clause}'"),
        };

        let caps = COMPARISON_RE.captures(clause).ok_or_else(unsupported)?;
        let field = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
            .ok_or_else(unsupported)?;
        let op: Operator = caps[3].parse().map_err(|_| unsupported())?;
        let literal = parse_literal(caps[4].trim()).ok_or_else(unsupported)?;

        Ok(Self::Comparison(Comparison { field, op, literal }))
    }

    /// Evaluates the predicate against a feature's attributes. `oid_field`
    /// names the identifier field, which resolves to the object ID when the
    /// feature has no attribute of that name.
    #[must_use]
    pub fn matches(&self, feature: &Feature, oid_field: &str) -> bool {
        match self {
            Self::Always => true,
            Self::Comparison(comparison) => comparison.matches(feature, oid_field),
        }
    }
}

impl Comparison {
    fn matches(&self, feature: &Feature, oid_field: &str) -> bool {
        let Some(value) = feature.value(&self.field, oid_field) else {
            return false;
        };
        compare(&value, &self.literal).is_some_and(|ordering| self.op.accepts(ordering))
    }
}

/// Compares an attribute value against a literal.
///
/// Numeric when both sides are numbers (text attributes holding a number
/// count as numbers; dates compare as timestamps against date literals),
/// otherwise lexicographic on the text forms. `None` for nulls and NaN.
fn compare(value: &AttributeValue, literal: &Literal) -> Option<Ordering> {
    if value.is_null() {
        return None;
    }

    if let AttributeValue::Date(dt) = value
        && let Literal::Text(text) = literal
        && let Some(other) = parse_date(text)
    {
        return Some(dt.cmp(&other));
    }

    let lhs = value.as_f64().or_else(|| match value {
        AttributeValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    });
    let rhs = match literal {
        Literal::Number(n) => Some(*n),
        Literal::Text(text) => text.trim().parse::<f64>().ok(),
    };

    if let (Some(lhs), Some(rhs)) = (lhs, rhs) {
        return lhs.partial_cmp(&rhs);
    }

    let rhs = match literal {
        Literal::Number(n) => n.to_string(),
        Literal::Text(text) => text.clone(),
    };
    Some(value.to_string().as_str().cmp(rhs.as_str()))
}

fn parse_literal(raw: &str) -> Option<Literal> {
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        let inner = &raw[1..raw.len() - 1];
        if inner.replace("''", "").contains('\'') {
            return None;
        }
        return Some(Literal::Text(inner.replace("''", "'")));
    }

    if raw.is_empty() || raw.contains(char::is_whitespace) || raw.contains('\'') {
        return None;
    }

    Some(
        raw.parse::<f64>()
            .map_or_else(|_| Literal::Text(raw.to_string()), Literal::Number),
    )
}
