//! Process-wide JsonSQL authorization policy.
//!
//! The registry is built once from TOML at startup and never mutated.
//! Every name is resolved into the closed vocabularies in [`super::types`]
//! at load time, so an unsupported column type or operator fails here rather
//! than during query compilation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::types::{ComparisonOp, Connective, Table, ValueType};

/// Allow-list shipped with the binary, used when no file is configured.
pub const DEFAULT_ALLOWLIST: &str = include_str!("../../config/allowlist.toml");

/// Raw allow-list configuration as written on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct AllowListConfig {
    #[serde(default)]
    pub query_kinds: BTreeMap<String, QueryKindPolicy>,
    #[serde(default)]
    pub operators: Vec<String>,
    #[serde(default)]
    pub connectives: Vec<String>,
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub columns: BTreeMap<String, String>,
}

/// Access pattern granted by a query kind.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct QueryKindPolicy {
    /// Tables this kind may read.
    pub tables: Vec<String>,

    /// Whether an empty filter means an unrestricted scan for this kind.
    #[serde(default)]
    pub allow_unfiltered: bool,

    /// Whether anonymous callers are refused.
    #[serde(default = "default_require_api_key")]
    pub require_api_key: bool,
}

fn default_require_api_key() -> bool {
    true
}

/// Allow-list construction failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to parse allow-list: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read allow-list file: {0}")]
    Io(#[from] std::io::Error),

    #[error("column '{column}' declares unsupported type '{type_name}'")]
    UnsupportedType { column: String, type_name: String },

    #[error("column name '{0}' is not a plain identifier")]
    InvalidColumnName(String),

    #[error("operator '{0}' is not supported")]
    UnsupportedOperator(String),

    #[error("connective '{0}' is not supported")]
    UnsupportedConnective(String),

    #[error("table '{0}' has no known layout")]
    UnsupportedTable(String),

    #[error("query kind '{kind}' references table '{table}' which is not allowed")]
    KindTableNotAllowed { kind: String, table: String },
}

/// Resolved query-kind policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindPolicy {
    pub tables: HashSet<Table>,
    pub allow_unfiltered: bool,
    pub require_api_key: bool,
}

impl KindPolicy {
    pub fn covers(&self, table: Table) -> bool {
        self.tables.contains(&table)
    }
}

/// Immutable allow-list consulted by the compiler and the gate.
#[derive(Debug, Clone)]
pub struct AllowListRegistry {
    kinds: BTreeMap<String, KindPolicy>,
    operators: HashSet<ComparisonOp>,
    connectives: HashSet<Connective>,
    tables: HashSet<Table>,
    columns: HashMap<String, ValueType>,
}

impl AllowListRegistry {
    /// Build the registry, resolving every name up front.
    pub fn from_config(config: AllowListConfig) -> Result<Self, RegistryError> {
        let operators = config
            .operators
            .iter()
            .map(|name| {
                ComparisonOp::parse(name)
                    .ok_or_else(|| RegistryError::UnsupportedOperator(name.clone()))
            })
            .collect::<Result<HashSet<_>, _>>()?;

        let connectives = config
            .connectives
            .iter()
            .map(|name| {
                Connective::parse(name)
                    .ok_or_else(|| RegistryError::UnsupportedConnective(name.clone()))
            })
            .collect::<Result<HashSet<_>, _>>()?;

        let tables = config
            .tables
            .iter()
            .map(|name| Table::parse(name).ok_or_else(|| RegistryError::UnsupportedTable(name.clone())))
            .collect::<Result<HashSet<_>, _>>()?;

        let mut columns = HashMap::with_capacity(config.columns.len());
        for (column, type_name) in config.columns {
            if !is_plain_identifier(&column) {
                return Err(RegistryError::InvalidColumnName(column));
            }
            let value_type =
                ValueType::parse(&type_name).ok_or_else(|| RegistryError::UnsupportedType {
                    column: column.clone(),
                    type_name: type_name.clone(),
                })?;
            columns.insert(column, value_type);
        }

        let mut kinds = BTreeMap::new();
        for (kind, policy) in config.query_kinds {
            let mut kind_tables = HashSet::with_capacity(policy.tables.len());
            for name in &policy.tables {
                let table = Table::parse(name)
                    .filter(|table| tables.contains(table))
                    .ok_or_else(|| RegistryError::KindTableNotAllowed {
                        kind: kind.clone(),
                        table: name.clone(),
                    })?;
                kind_tables.insert(table);
            }
            kinds.insert(
                kind,
                KindPolicy {
                    tables: kind_tables,
                    allow_unfiltered: policy.allow_unfiltered,
                    require_api_key: policy.require_api_key,
                },
            );
        }

        tracing::debug!(
            kinds = kinds.len(),
            operators = operators.len(),
            connectives = connectives.len(),
            tables = tables.len(),
            columns = columns.len(),
            "allow-list resolved"
        );

        Ok(Self {
            kinds,
            operators,
            connectives,
            tables,
            columns,
        })
    }

    /// Parse and build from TOML text.
    pub fn from_toml_str(source: &str) -> Result<Self, RegistryError> {
        let config: AllowListConfig = toml::from_str(source)?;
        Self::from_config(config)
    }

    /// Load from a file, or the embedded default when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, RegistryError> {
        match path {
            Some(path) => {
                let source = std::fs::read_to_string(path)?;
                Self::from_toml_str(&source)
            }
            None => Self::from_toml_str(DEFAULT_ALLOWLIST),
        }
    }

    pub fn is_allowed(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    pub fn is_allowed_operator(&self, op: &str) -> bool {
        ComparisonOp::parse(op).is_some_and(|op| self.operators.contains(&op))
    }

    pub fn is_allowed_table(&self, table: &str) -> bool {
        Table::parse(table).is_some_and(|table| self.tables.contains(&table))
    }

    pub fn is_allowed_connective(&self, op: &str) -> bool {
        Connective::parse(op).is_some_and(|op| self.connectives.contains(&op))
    }

    /// Declared type of a column, if the column is allow-listed at all.
    pub fn type_of(&self, column: &str) -> Option<ValueType> {
        self.columns.get(column).copied()
    }

    /// Registry-owned column name and its declared type.
    pub(crate) fn column(&self, column: &str) -> Option<(&str, ValueType)> {
        self.columns
            .get_key_value(column)
            .map(|(name, value_type)| (name.as_str(), *value_type))
    }

    /// Policy for a query kind.
    pub fn kind(&self, kind: &str) -> Option<&KindPolicy> {
        self.kinds.get(kind)
    }

    /// Resolve a table name to an allowed table.
    pub fn table(&self, name: &str) -> Option<Table> {
        Table::parse(name).filter(|table| self.tables.contains(table))
    }

    /// First query kind, by name, whose policy covers `table`.
    pub fn default_kind_for(&self, table: Table) -> Option<&str> {
        self.kinds
            .iter()
            .find(|(_, policy)| policy.covers(table))
            .map(|(name, _)| name.as_str())
    }

    pub(crate) fn allows_operator(&self, op: ComparisonOp) -> bool {
        self.operators.contains(&op)
    }

    pub(crate) fn allows_connective(&self, op: Connective) -> bool {
        self.connectives.contains(&op)
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
