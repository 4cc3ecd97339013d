//! JsonSQL: allow-listed JSON filter expressions compiled to parameterized SQL.
//!
//! Untrusted callers never supply SQL. They send a JSON logic tree which is
//! validated against an [`AllowListRegistry`], compiled by [`LogicCompiler`]
//! and executed behind the [`AccessGate`].

pub mod allow_list;
pub mod compiler;
pub mod error;
pub mod gate;
pub mod types;

pub use allow_list::{AllowListConfig, AllowListRegistry, KindPolicy, QueryKindPolicy, RegistryError};
pub use compiler::{CompileLimits, DEFAULT_MAX_DEPTH, DEFAULT_MAX_NODES, LogicCompiler, is_empty_filter};
pub use error::{AccessError, AuthError, CompileError, GateError};
pub use gate::{AccessGate, Caller, CallerIdentity, Record};
pub use types::{ComparisonOp, CompiledQuery, Connective, Literal, Table, ValueType};
