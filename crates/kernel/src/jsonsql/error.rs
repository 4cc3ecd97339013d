//! JsonSQL error taxonomy.
//!
//! Every rejection names the rule it violated. [`GateError`] is the union
//! recovered at the access gate and rendered as `{"JsonSQL error": ...}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use super::types::ValueType;
use crate::error::StoreError;

/// Credential failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingCredential,

    #[error("Invalid API key")]
    InvalidApiKey,
}

/// Expression compilation failures.
///
/// `path` locates the first offending node, e.g. `$.and[1].eq`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("unknown column '{column}' at {path}")]
    UnknownColumn { path: String, column: String },

    #[error("operator '{operator}' is not allowed at {path}")]
    UnknownOperator { path: String, operator: String },

    #[error("connective '{connective}' is not allowed at {path}")]
    UnknownConnective { path: String, connective: String },

    #[error("type mismatch at {path}: column '{column}' expects {expected}, got {found}")]
    TypeMismatch {
        path: String,
        column: String,
        expected: ValueType,
        found: &'static str,
    },

    #[error("malformed expression at {path}: {reason}")]
    MalformedExpression { path: String, reason: String },

    #[error("expression too large at {path}: {reason}")]
    ExpressionTooLarge { path: String, reason: String },
}

impl CompileError {
    pub(crate) fn malformed(path: &str, reason: impl Into<String>) -> Self {
        Self::MalformedExpression {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Path of the offending node.
    pub fn path(&self) -> &str {
        match self {
            Self::UnknownColumn { path, .. }
            | Self::UnknownOperator { path, .. }
            | Self::UnknownConnective { path, .. }
            | Self::TypeMismatch { path, .. }
            | Self::MalformedExpression { path, .. }
            | Self::ExpressionTooLarge { path, .. } => path,
        }
    }
}

/// Query-kind and table authorization failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("unknown query kind '{0}'")]
    UnknownQueryKind(String),

    #[error("unknown table '{0}'")]
    UnknownTable(String),

    #[error("query kind '{kind}' does not permit table '{table}'")]
    KindTableMismatch { kind: String, table: String },
}

/// Any failure surfaced by the access gate.
#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GateError {
    /// Stable snake_case name of the violated rule.
    pub fn rule(&self) -> &'static str {
        match self {
            Self::Auth(AuthError::MissingCredential) => "missing_credential",
            Self::Auth(AuthError::InvalidApiKey) => "invalid_api_key",
            Self::Access(AccessError::UnknownQueryKind(_)) => "unknown_query_kind",
            Self::Access(AccessError::UnknownTable(_)) => "unknown_table",
            Self::Access(AccessError::KindTableMismatch { .. }) => "kind_table_mismatch",
            Self::Compile(CompileError::UnknownColumn { .. }) => "unknown_column",
            Self::Compile(CompileError::UnknownOperator { .. }) => "unknown_operator",
            Self::Compile(CompileError::UnknownConnective { .. }) => "unknown_connective",
            Self::Compile(CompileError::TypeMismatch { .. }) => "type_mismatch",
            Self::Compile(CompileError::MalformedExpression { .. }) => "malformed_expression",
            Self::Compile(CompileError::ExpressionTooLarge { .. }) => "expression_too_large",
            Self::Store(_) => "execution_failure",
        }
    }

    /// HTTP status for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(AuthError::InvalidApiKey) => StatusCode::UNAUTHORIZED,
            Self::Auth(AuthError::MissingCredential) | Self::Access(_) | Self::Compile(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Only engine failures may be transient; everything else is permanent
    /// for the given input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let message = match &self {
            GateError::Store(e) => {
                tracing::error!(error = %e, "JsonSQL store failure");
                "store execution failure".to_string()
            }
            other => other.to_string(),
        };

        (
            self.status_code(),
            Json(json!({ "JsonSQL error": message })),
        )
            .into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_map_to_statuses() {
        assert_eq!(
            GateError::from(AuthError::InvalidApiKey).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GateError::from(AuthError::MissingCredential).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn only_store_errors_are_retryable() {
        let compile = GateError::from(CompileError::malformed("$", "empty"));
        assert!(!compile.is_retryable());
        let store = GateError::from(StoreError::ExecutionFailure(sqlx::Error::PoolTimedOut));
        assert!(store.is_retryable());
        assert_eq!(store.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn message_names_rule_and_location() {
        let err = GateError::from(CompileError::UnknownColumn {
            path: "$.and[0].eq".into(),
            column: "secret".into(),
        });
        assert_eq!(err.rule(), "unknown_column");
        assert_eq!(err.to_string(), "unknown column 'secret' at $.and[0].eq");
    }
}
