//! JSON logic tree → parameterized WHERE fragment.
//!
//! Wire form:
//! - comparison: `{"eq": ["creature", "owlbear"]}`
//! - connective: `{"and": [<node>, <node>, ...]}`
//!
//! Every identifier and operator token in the output comes from the
//! allow-list; caller literals only ever travel in `params`.

use serde_json::Value;

use super::allow_list::AllowListRegistry;
use super::error::CompileError;
use super::types::{ComparisonOp, CompiledQuery, Connective, Literal, Table};

/// Maximum nesting depth of a logic tree.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Maximum number of nodes (comparisons + connectives) in a logic tree.
pub const DEFAULT_MAX_NODES: usize = 256;

/// Size bounds applied to every compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileLimits {
    pub max_depth: usize,
    pub max_nodes: usize,
}

impl Default for CompileLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

/// Whether a filter is "no filter at all" (`null` or `{}`).
pub fn is_empty_filter(filter: &Value) -> bool {
    match filter {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Compiler bound to one allow-list.
pub struct LogicCompiler<'a> {
    registry: &'a AllowListRegistry,
    limits: CompileLimits,
}

struct CompileState {
    table: Table,
    params: Vec<Literal>,
    nodes: usize,
}

impl<'a> LogicCompiler<'a> {
    pub fn new(registry: &'a AllowListRegistry) -> Self {
        Self {
            registry,
            limits: CompileLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: CompileLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Compile `node` against `table`'s column layout.
    ///
    /// Halts at the first offending node; never returns partial SQL.
    pub fn compile(&self, node: &Value, table: Table) -> Result<CompiledQuery, CompileError> {
        let mut state = CompileState {
            table,
            params: Vec::new(),
            nodes: 0,
        };
        let sql = self.compile_node(node, "$", 0, &mut state)?;

        debug_assert_eq!(sql.matches('?').count(), state.params.len());

        Ok(CompiledQuery {
            table,
            sql,
            params: state.params,
        })
    }

    fn compile_node(
        &self,
        node: &Value,
        path: &str,
        depth: usize,
        state: &mut CompileState,
    ) -> Result<String, CompileError> {
        if depth >= self.limits.max_depth {
            return Err(CompileError::ExpressionTooLarge {
                path: path.to_string(),
                reason: format!("nesting exceeds maximum depth of {}", self.limits.max_depth),
            });
        }

        state.nodes += 1;
        if state.nodes > self.limits.max_nodes {
            return Err(CompileError::ExpressionTooLarge {
                path: path.to_string(),
                reason: format!("expression exceeds maximum of {} nodes", self.limits.max_nodes),
            });
        }

        let Some(object) = node.as_object() else {
            return Err(CompileError::malformed(
                path,
                format!("expected an object, found {}", json_kind(node)),
            ));
        };

        let mut entries = object.iter();
        let (name, operand) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            (None, _) => return Err(CompileError::malformed(path, "empty expression")),
            _ => {
                return Err(CompileError::malformed(
                    path,
                    "expression must have exactly one operator key",
                ));
            }
        };
        let node_path = format!("{path}.{name}");

        if let Some(connective) = Connective::parse(name) {
            return self.compile_connective(connective, name, operand, &node_path, depth, state);
        }
        if let Some(op) = ComparisonOp::parse(name) {
            return self.compile_comparison(name, Some(op), operand, &node_path, state);
        }

        // Unrecognised name: the operand's shape decides which rule it broke.
        match operand {
            Value::Array(items) if looks_like_comparison(items) => {
                self.compile_comparison(name, None, operand, &node_path, state)
            }
            Value::Array(_) => Err(CompileError::UnknownConnective {
                path: node_path,
                connective: name.clone(),
            }),
            _ => Err(CompileError::malformed(&node_path, "operand must be an array")),
        }
    }

    fn compile_connective(
        &self,
        connective: Connective,
        name: &str,
        operand: &Value,
        path: &str,
        depth: usize,
        state: &mut CompileState,
    ) -> Result<String, CompileError> {
        if !self.registry.allows_connective(connective) {
            return Err(CompileError::UnknownConnective {
                path: path.to_string(),
                connective: name.to_string(),
            });
        }

        let Some(children) = operand.as_array() else {
            return Err(CompileError::malformed(path, "connective operand must be an array"));
        };
        if children.is_empty() {
            return Err(CompileError::malformed(
                path,
                "connective requires at least one child",
            ));
        }
        if connective == Connective::Not && children.len() != 1 {
            return Err(CompileError::malformed(path, "'not' takes exactly one child"));
        }

        let mut fragments = Vec::with_capacity(children.len());
        for (index, child) in children.iter().enumerate() {
            let child_path = format!("{path}[{index}]");
            fragments.push(self.compile_node(child, &child_path, depth + 1, state)?);
        }

        Ok(match connective {
            Connective::Not => format!("(NOT {})", fragments.join(" ")),
            Connective::And | Connective::Or => {
                format!("({})", fragments.join(&format!(" {} ", connective.sql())))
            }
        })
    }

    fn compile_comparison(
        &self,
        name: &str,
        op: Option<ComparisonOp>,
        operand: &Value,
        path: &str,
        state: &mut CompileState,
    ) -> Result<String, CompileError> {
        let (column, value) = match operand.as_array().map(Vec::as_slice) {
            Some([Value::String(column), value]) => (column.as_str(), value),
            Some([_, _]) => {
                return Err(CompileError::malformed(path, "comparison column must be a string"));
            }
            _ => {
                return Err(CompileError::malformed(
                    path,
                    "comparison expects [column, value]",
                ));
            }
        };

        // The emitted identifier is the registry's own copy, never the caller's.
        let (column, expected) = self
            .registry
            .column(column)
            .filter(|(column, _)| state.table.has_column(column))
            .ok_or_else(|| CompileError::UnknownColumn {
                path: path.to_string(),
                column: column.to_string(),
            })?;

        let op = op
            .filter(|op| self.registry.allows_operator(*op) && op.accepts(expected))
            .ok_or_else(|| CompileError::UnknownOperator {
                path: path.to_string(),
                operator: name.to_string(),
            })?;

        let literal = literal_of(value)
            .filter(|literal| literal.value_type() == expected)
            .ok_or_else(|| CompileError::TypeMismatch {
                path: path.to_string(),
                column: column.to_string(),
                expected,
                found: json_kind(value),
            })?;

        state.params.push(literal);
        Ok(format!("{column} {} ?", op.sql()))
    }
}

fn looks_like_comparison(items: &[Value]) -> bool {
    matches!(items, [Value::String(_), value] if !value.is_array() && !value.is_object())
}

fn literal_of(value: &Value) -> Option<Literal> {
    match value {
        Value::String(s) => Some(Literal::String(s.clone())),
        Value::Number(n) => n.as_i64().map(Literal::Integer),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() => "integer",
        Value::Number(n) if n.is_u64() => "integer out of range",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
