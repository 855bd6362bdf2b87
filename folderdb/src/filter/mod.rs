// Filter evaluation for search and complex search

use crate::document::{canonical_string, DocumentObject};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Comparison applied by a [`Filter`].
///
/// On the wire an operator is either its name (any case) or its numeric code,
/// in declaration order starting at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
}

// Numbers arrive as arbitrary-precision text, so codes are read off a `Value`
// rather than through an untagged enum.
impl TryFrom<Value> for Operator {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .and_then(|code| u8::try_from(code).ok())
                .and_then(Operator::from_code)
                .ok_or_else(|| format!("unknown operator code {n}")),
            Value::String(name) => name.parse(),
            other => Err(format!("invalid operator {other}")),
        }
    }
}

impl Operator {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Operator::Equals),
            1 => Some(Operator::NotEquals),
            2 => Some(Operator::GreaterThan),
            3 => Some(Operator::LessThan),
            4 => Some(Operator::Contains),
            _ => None,
        }
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.parse::<u8>() {
            return Operator::from_code(code).ok_or_else(|| format!("unknown operator code {code}"));
        }
        match s.to_ascii_lowercase().as_str() {
            "equals" | "eq" => Ok(Operator::Equals),
            "notequals" | "ne" => Ok(Operator::NotEquals),
            "greaterthan" | "gt" => Ok(Operator::GreaterThan),
            "lessthan" | "lt" => Ok(Operator::LessThan),
            "contains" => Ok(Operator::Contains),
            _ => Err(format!("unknown operator '{s}'")),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operator::Equals => "Equals",
            Operator::NotEquals => "NotEquals",
            Operator::GreaterThan => "GreaterThan",
            Operator::LessThan => "LessThan",
            Operator::Contains => "Contains",
        };
        f.write_str(name)
    }
}

/// A single predicate: `field <operator> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: Operator,
    #[serde(deserialize_with = "scalar_as_string")]
    pub value: String,
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Filter {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// Accept `"18"` as well as `18` or `true` for a filter value.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(canonical_string(&value).into_owned())
}

/// Evaluate one filter against a document. A missing field never matches.
pub fn evaluate(document: &DocumentObject, filter: &Filter) -> bool {
    let Some(field) = document.get(&filter.field) else {
        return false;
    };
    let actual = canonical_string(field);
    let expected = filter.value.as_str();

    match filter.operator {
        Operator::Equals => eq_ignore_case(&actual, expected),
        Operator::NotEquals => !eq_ignore_case(&actual, expected),
        Operator::Contains => folded(&actual).contains(&folded(expected)),
        Operator::GreaterThan => compare(&actual, expected) == Ordering::Greater,
        Operator::LessThan => compare(&actual, expected) == Ordering::Less,
    }
}

/// True when every filter matches. Stops at the first failure.
pub fn matches_all(document: &DocumentObject, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| evaluate(document, filter))
}

/// Numeric comparison when both sides parse as finite-or-infinite doubles,
/// otherwise case-insensitive lexicographic comparison.
pub fn compare(left: &str, right: &str) -> Ordering {
    if let (Some(l), Some(r)) = (parse_number(left), parse_number(right)) {
        if let Some(ordering) = l.partial_cmp(&r) {
            return ordering;
        }
    }
    fold_case(left).cmp(fold_case(right))
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| !n.is_nan())
}

fn eq_ignore_case(left: &str, right: &str) -> bool {
    fold_case(left).eq(fold_case(right))
}

fn fold_case(text: &str) -> impl Iterator<Item = char> + '_ {
    text.chars().flat_map(char::to_uppercase)
}

fn folded(text: &str) -> String {
    fold_case(text).collect()
}
