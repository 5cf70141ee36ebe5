//! Request-side types: filter conditions, sorting and composed statements.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GelError;

pub use serde_json::Value;

/// Named query arguments, placeholder name (without `$`) to bound value.
pub type Params = BTreeMap<String, Value>;

/// Field-value payload of a create or update, keyed by framework field name.
pub type Record = serde_json::Map<String, Value>;

/// Comparison operator of a filter condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[default]
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    /// Set membership.
    In,
    Contains,
    StartsWith,
    EndsWith,
}

impl Operator {
    /// Text-pattern operators share the `like` token.
    pub fn is_pattern(self) -> bool {
        matches!(
            self,
            Operator::Contains | Operator::StartsWith | Operator::EndsWith
        )
    }

    /// Wrap a pattern operand with `%` wildcards.
    ///
    /// Returns `None` for non-pattern operators.
    pub fn wildcard(self, operand: &str) -> Option<String> {
        match self {
            Operator::Contains => Some(format!("%{operand}%")),
            Operator::StartsWith => Some(format!("{operand}%")),
            Operator::EndsWith => Some(format!("%{operand}")),
            Operator::Eq
            | Operator::Ne
            | Operator::Lt
            | Operator::Lte
            | Operator::Gt
            | Operator::Gte
            | Operator::In => None,
        }
    }
}

impl FromStr for Operator {
    type Err = GelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(Operator::Eq),
            "ne" => Ok(Operator::Ne),
            "lt" => Ok(Operator::Lt),
            "lte" => Ok(Operator::Lte),
            "gt" => Ok(Operator::Gt),
            "gte" => Ok(Operator::Gte),
            "in" => Ok(Operator::In),
            "contains" => Ok(Operator::Contains),
            "starts_with" => Ok(Operator::StartsWith),
            "ends_with" => Ok(Operator::EndsWith),
            other => Err(GelError::UnknownOperator(other.to_string())),
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::In => "in",
            Operator::Contains => "contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
        };
        f.write_str(name)
    }
}

/// Logical connector joining a condition to the one before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Connector {
    #[default]
    And,
    Or,
}

/// One clause of a where-expression.
///
/// The connector of the first condition in a sequence is never emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Where {
    pub field: String,
    #[serde(default)]
    pub operator: Operator,
    pub value: Value,
    #[serde(default)]
    pub connector: Connector,
}

impl Where {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            connector: Connector::And,
        }
    }

    /// Equality condition.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Eq, value)
    }

    /// Join this condition to the previous one with `or`.
    pub fn or(mut self) -> Self {
        self.connector = Connector::Or;
        self
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Sort order for `find_many`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortBy {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

impl SortBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

/// A composed EdgeQL statement and the arguments its placeholders refer to.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statement {
    pub text: String,
    pub params: Params,
}

impl Statement {
    pub fn new(text: impl Into<String>, params: Params) -> Self {
        Self {
            text: text.into(),
            params,
        }
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_from_str() {
        assert_eq!("starts_with".parse::<Operator>().unwrap(), Operator::StartsWith);
        assert_eq!("in".parse::<Operator>().unwrap(), Operator::In);
        assert!(matches!(
            "between".parse::<Operator>(),
            Err(GelError::UnknownOperator(op)) if op == "between"
        ));
    }

    #[test]
    fn test_wildcards() {
        assert_eq!(Operator::Contains.wildcard("ab").as_deref(), Some("%ab%"));
        assert_eq!(Operator::StartsWith.wildcard("ab").as_deref(), Some("ab%"));
        assert_eq!(Operator::EndsWith.wildcard("ab").as_deref(), Some("%ab"));
        assert_eq!(Operator::Eq.wildcard("ab"), None);
    }

    #[test]
    fn test_where_deserialize_defaults() {
        let cond: Where = serde_json::from_value(json!({
            "field": "email",
            "value": "a@b.com"
        }))
        .unwrap();
        assert_eq!(cond.operator, Operator::Eq);
        assert_eq!(cond.connector, Connector::And);

        let cond: Where = serde_json::from_value(json!({
            "field": "name",
            "operator": "ends_with",
            "value": "son",
            "connector": "OR"
        }))
        .unwrap();
        assert_eq!(cond, Where::new("name", Operator::EndsWith, "son").or());
    }

    #[test]
    fn test_unknown_operator_rejected_by_serde() {
        let res: Result<Where, _> = serde_json::from_value(json!({
            "field": "name",
            "operator": "regex",
            "value": "x"
        }));
        assert!(res.is_err());
    }
}
