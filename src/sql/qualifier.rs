//! Translation of caller predicates into a SQL `WHERE` fragment.
//!
//! Two shapes of input are accepted:
//!
//! - a [`QualifierSet`]: per field, any number of `(operator, value)` pairs;
//!   everything is ANDed together;
//! - an equality string `"field = value"` with exactly one `=`.
//!
//! ```text
//! {uid: [(">", 0), ("<", 500)], shell: [("=", "/bin/sh")]}
//!   →  "shell" = "/bin/sh" and "uid" > "0" and "uid" < "500"
//!
//! "pid = 42"  →  "pid" = "42"
//! ```
//!
//! By default every value is rendered double-quoted, numbers included. This
//! relies on SQLite treating a double-quoted token that is not a column name
//! as a string literal, and on its type affinity for comparisons.
//! [`ValueRendering::Typed`] renders proper SQL literals instead.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Error type for qualifier translation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QualifierError {
    /// The equality string did not contain exactly one `=`.
    #[error("malformed qualifier {input:?}: expected exactly one '=', found {equals}")]
    Malformed { input: String, equals: usize },

    /// The operator is not a SQL comparison operator.
    #[error("unsupported operator {0:?}")]
    UnsupportedOperator(String),
}

/// Comparison operators accepted in the rich form (upper-cased).
const OPERATORS: &[&str] = &[
    "=", "==", "!=", "<>", "<", "<=", ">", ">=", "LIKE", "NOT LIKE", "GLOB", "NOT GLOB", "REGEXP",
    "NOT REGEXP", "MATCH", "NOT MATCH", "IS", "IS NOT",
];

/// A scalar predicate value.
#[derive(Debug, Clone, PartialEq)]
pub enum QualValue {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
}

impl QualValue {
    /// Convert a JSON scalar. Arrays and objects are not qualifier values.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Double)),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Guess the type of a command-line value: integer, then float, then text.
    pub fn infer(raw: &str) -> Self {
        if let Ok(i) = raw.parse::<i64>() {
            Self::Int(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            Self::Double(f)
        } else {
            Self::Text(raw.to_string())
        }
    }
}

impl fmt::Display for QualValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for QualValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for QualValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for QualValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for QualValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for QualValue {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<bool> for QualValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// A single `field operator value` predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Qualifier {
    pub field: String,
    pub operator: String,
    pub value: QualValue,
}

impl Qualifier {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: impl Into<QualValue>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// How predicate values are written into SQL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueRendering {
    /// Every value as a double-quoted token: `"30"`, `"bash"`.
    #[default]
    Quoted,
    /// SQL literals by type: `30`, `1.5`, `1`, `NULL`, `'bash'`.
    Typed,
}

/// Conjunction of qualifiers, grouped by field.
///
/// Fields render in name order so the same set always yields the same SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualifierSet {
    fields: BTreeMap<String, Vec<(String, QualValue)>>,
}

impl QualifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, qualifier: Qualifier) {
        self.fields
            .entry(qualifier.field)
            .or_default()
            .push((qualifier.operator, qualifier.value));
    }

    pub fn with(mut self, qualifier: Qualifier) -> Self {
        self.push(qualifier);
        self
    }

    /// True when no field carries a predicate.
    pub fn is_empty(&self) -> bool {
        self.fields.values().all(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.fields.values().map(Vec::len).sum()
    }

    /// Render as a `WHERE` fragment, or `None` when empty.
    pub fn to_sql(&self, rendering: ValueRendering) -> Result<Option<String>, QualifierError> {
        let mut groups = Vec::with_capacity(self.fields.len());
        for (field, predicates) in &self.fields {
            if predicates.is_empty() {
                continue;
            }
            let rendered = predicates
                .iter()
                .map(|(operator, value)| render_predicate(field, operator, value, rendering))
                .collect::<Result<Vec<_>, _>>()?;
            groups.push(rendered.join(" and "));
        }

        if groups.is_empty() {
            Ok(None)
        } else {
            Ok(Some(groups.join(" and ")))
        }
    }
}

impl FromIterator<Qualifier> for QualifierSet {
    fn from_iter<I: IntoIterator<Item = Qualifier>>(iter: I) -> Self {
        let mut set = Self::new();
        for qualifier in iter {
            set.push(qualifier);
        }
        set
    }
}

/// Transform `field = value` into `"field" = "value"`.
pub fn translate_equality(input: &str) -> Result<String, QualifierError> {
    let parts: Vec<&str> = input.split('=').collect();
    if parts.len() != 2 {
        return Err(QualifierError::Malformed {
            input: input.to_string(),
            equals: parts.len() - 1,
        });
    }

    let key = parts[0].trim();
    let value = parts[1].trim();
    Ok(format!("{} = {}", quote_identifier(key), double_quote(value)))
}

/// Both qualifier shapes a caller may hold for one request.
#[derive(Debug, Clone, Default)]
pub struct QualifierInput {
    pub rich: Option<QualifierSet>,
    pub equality: Option<String>,
}

impl QualifierInput {
    pub fn rich(set: QualifierSet) -> Self {
        Self {
            rich: Some(set),
            equality: None,
        }
    }

    pub fn equality(input: impl Into<String>) -> Self {
        Self {
            rich: None,
            equality: Some(input.into()),
        }
    }

    /// Build the `WHERE` fragment.
    ///
    /// A non-empty rich set wins; the equality string is only consulted
    /// without one. A malformed equality string yields no filter.
    pub fn where_clause(&self, rendering: ValueRendering) -> Result<Option<String>, QualifierError> {
        if let Some(set) = self.rich.as_ref().filter(|set| !set.is_empty()) {
            return set.to_sql(rendering);
        }

        match self.equality.as_deref() {
            Some(input) => match translate_equality(input) {
                Ok(clause) => Ok(Some(clause)),
                Err(e) => {
                    warn!(error = %e, "ignoring qualifier; querying unfiltered");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }
}

fn render_predicate(
    field: &str,
    operator: &str,
    value: &QualValue,
    rendering: ValueRendering,
) -> Result<String, QualifierError> {
    let operator = normalize_operator(operator)?;
    let value = match rendering {
        ValueRendering::Quoted => double_quote(&value.to_string()),
        ValueRendering::Typed => typed_literal(value),
    };
    Ok(format!("{} {} {}", quote_identifier(field), operator, value))
}

fn normalize_operator(operator: &str) -> Result<String, QualifierError> {
    let normalized = operator.split_whitespace().collect::<Vec<_>>().join(" ");
    if OPERATORS.contains(&normalized.to_ascii_uppercase().as_str()) {
        Ok(normalized)
    } else {
        Err(QualifierError::UnsupportedOperator(operator.to_string()))
    }
}

pub(crate) fn quote_identifier(name: &str) -> String {
    double_quote(name)
}

fn double_quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

fn typed_literal(value: &QualValue) -> String {
    match value {
        QualValue::Null => "NULL".to_string(),
        QualValue::Bool(b) => u8::from(*b).to_string(),
        QualValue::Int(i) => i.to_string(),
        QualValue::Double(d) if d.is_finite() => d.to_string(),
        QualValue::Double(d) => format!("'{d}'"),
        QualValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
    }
}
