//! JsonSQL type definitions.
//!
//! Closed vocabularies shared by the allow-list, the compiler and the gate:
//! - Table: queryable tables and their fixed column layouts
//! - ValueType / Literal: the value types a filter may compare against
//! - ComparisonOp / Connective: operator names accepted on the wire
//! - CompiledQuery: parameterized WHERE fragment bound to one table

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tables reachable through the generic query path.
///
/// `apikeys` is deliberately absent: key rows are never readable through JsonSQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Images,
    Suggestions,
}

impl Table {
    /// Resolve a table name as it appears in configuration and URLs.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "images" => Some(Self::Images),
            "suggestions" => Some(Self::Suggestions),
            _ => None,
        }
    }

    /// Table name in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Images => "images",
            Self::Suggestions => "suggestions",
        }
    }

    /// Column layout in SELECT order. Must match the record types in `models`.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Images => &["creature", "imageID", "userID", "time", "ranking", "voted"],
            Self::Suggestions => &["suggestion", "userID", "time"],
        }
    }

    /// Whether `column` is part of this table's layout.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns().contains(&column)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value types a column may be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Integer,
}

impl ValueType {
    /// Resolve a configured type name. Unknown names are rejected at load time.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "string" | "str" | "text" => Some(Self::String),
            "integer" | "int" => Some(Self::Integer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caller-supplied literal, only ever bound as a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    String(String),
    Integer(i64),
}

impl Literal {
    pub fn value_type(&self) -> ValueType {
        match self {
            Literal::String(_) => ValueType::String,
            Literal::Integer(_) => ValueType::Integer,
        }
    }
}

impl From<Literal> for sea_query::Value {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::String(s) => s.into(),
            Literal::Integer(i) => i.into(),
        }
    }
}

/// Comparison operators accepted at a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl ComparisonOp {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "lt" => Some(Self::Lt),
            "le" => Some(Self::Le),
            "gt" => Some(Self::Gt),
            "ge" => Some(Self::Ge),
            "like" => Some(Self::Like),
            _ => None,
        }
    }

    /// SQL token emitted for this operator.
    pub fn sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "LIKE",
        }
    }

    /// Whether the operator is meaningful for the given column type.
    pub fn accepts(&self, value_type: ValueType) -> bool {
        !matches!((self, value_type), (Self::Like, ValueType::Integer))
    }
}

/// Boolean connectives joining child expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connective {
    And,
    Or,
    Not,
}

impl Connective {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            "not" => Some(Self::Not),
            _ => None,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
        }
    }
}

/// Parameterized WHERE fragment produced by the compiler.
///
/// `sql` holds only allow-listed identifiers, operator tokens and `?`
/// placeholders; `params` lines up with the placeholders left to right.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledQuery {
    /// Table whose column layout the expression was validated against.
    pub table: Table,
    pub sql: String,
    pub params: Vec<Literal>,
}

impl CompiledQuery {
    /// Number of `?` placeholders in the fragment.
    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }
}
