//! Access gate: the single entry point for generic filtered reads.
//!
//! Order of checks for [`AccessGate::execute`]:
//! 1. query kind is allow-listed
//! 2. caller holds a key if the kind demands one
//! 3. table is allow-listed and covered by the kind
//! 4. filter compiles against the table layout
//!
//! The statement is assembled with sea-query around the compiled fragment and
//! the literals are bound in placeholder order.

use std::sync::Arc;
use std::time::Instant;

use sea_query::{Alias, Expr, Query, SqliteQueryBuilder};
use serde::Serialize;
use serde_json::Value;
use sqlx::query::QueryAs;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Sqlite, SqlitePool};
use tracing::{debug, warn};

use super::allow_list::AllowListRegistry;
use super::compiler::{CompileLimits, LogicCompiler, is_empty_filter};
use super::error::{AccessError, AuthError, CompileError, GateError};
use super::types::{CompiledQuery, Literal, Table};
use crate::error::StoreError;
use crate::metrics::Metrics;
use crate::models::{ApiKey, Image, Suggestion};

/// Metrics label for reads that bypass query kinds.
const PRIVILEGED_KIND: &str = "privileged";

/// Owner of a verified API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: i64,
    pub key_name: String,
}

/// Who is asking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    ApiKey(CallerIdentity),
    /// Chat member, identified by the chat transport rather than a key.
    Member(i64),
}

/// A row returned through the gate, named by its table's layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Image(Image),
    Suggestion(Suggestion),
}

/// Enforces the allow-list in front of the store.
#[derive(Debug, Clone)]
pub struct AccessGate {
    registry: Arc<AllowListRegistry>,
    pool: SqlitePool,
    limits: CompileLimits,
    metrics: Arc<Metrics>,
}

impl AccessGate {
    pub fn new(registry: Arc<AllowListRegistry>, pool: SqlitePool, metrics: Arc<Metrics>) -> Self {
        Self {
            registry,
            pool,
            limits: CompileLimits::default(),
            metrics,
        }
    }

    pub fn with_limits(mut self, limits: CompileLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn registry(&self) -> &AllowListRegistry {
        &self.registry
    }

    /// Resolve an `Authorization` value (raw key or `Bearer <key>`) to its owner.
    ///
    /// Fails `MissingCredential` when absent or blank and `InvalidApiKey` when
    /// no stored key matches. Store failures surface as `GateError::Store`.
    pub async fn authorize(&self, credential: Option<&str>) -> Result<CallerIdentity, GateError> {
        let raw_key = credential
            .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).trim())
            .filter(|value| !value.is_empty())
            .ok_or(AuthError::MissingCredential)?;

        let key = ApiKey::find_by_key(&self.pool, raw_key)
            .await?
            .ok_or(AuthError::InvalidApiKey)?;

        Ok(CallerIdentity {
            user_id: key.user_id,
            key_name: key.name,
        })
    }

    /// Compile a filter with this gate's limits, without touching the store.
    pub fn compile(&self, filter: &Value, table: Table) -> Result<CompiledQuery, CompileError> {
        LogicCompiler::new(&self.registry)
            .with_limits(self.limits)
            .compile(filter, table)
    }

    /// Run a filtered read on behalf of `caller` under query kind `kind`.
    pub async fn execute(
        &self,
        caller: &Caller,
        kind: &str,
        table: &str,
        filter: &Value,
    ) -> Result<Vec<Record>, GateError> {
        let result = self.execute_kind(caller, kind, table, filter).await;
        self.observe(kind, &result);
        result
    }

    /// Privileged read: no query-kind check, but the table allow-list and the
    /// compiler still apply and an empty filter is never a full scan.
    pub async fn execute_privileged(
        &self,
        table: &str,
        filter: &Value,
    ) -> Result<Vec<Record>, GateError> {
        let result = self.execute_unchecked_kind(table, filter).await;
        self.observe(PRIVILEGED_KIND, &result);
        result
    }

    async fn execute_unchecked_kind(
        &self,
        table: &str,
        filter: &Value,
    ) -> Result<Vec<Record>, GateError> {
        let table = self.resolve_table(table)?;
        let compiled = self.compile(filter, table)?;
        self.fetch(table, Some(&compiled)).await
    }

    async fn execute_kind(
        &self,
        caller: &Caller,
        kind: &str,
        table: &str,
        filter: &Value,
    ) -> Result<Vec<Record>, GateError> {
        let policy = self
            .registry
            .kind(kind)
            .ok_or_else(|| AccessError::UnknownQueryKind(kind.to_string()))?;

        if policy.require_api_key && *caller == Caller::Anonymous {
            return Err(AuthError::MissingCredential.into());
        }

        let table = self.resolve_table(table)?;
        if !policy.covers(table) {
            return Err(AccessError::KindTableMismatch {
                kind: kind.to_string(),
                table: table.to_string(),
            }
            .into());
        }

        if policy.allow_unfiltered && is_empty_filter(filter) {
            return self.fetch(table, None).await;
        }

        let compiled = self.compile(filter, table)?;
        self.fetch(table, Some(&compiled)).await
    }

    fn resolve_table(&self, name: &str) -> Result<Table, GateError> {
        self.registry
            .table(name)
            .ok_or_else(|| AccessError::UnknownTable(name.to_string()).into())
    }

    /// Execute one SELECT, retrying once on a store failure.
    async fn fetch(
        &self,
        table: Table,
        filter: Option<&CompiledQuery>,
    ) -> Result<Vec<Record>, GateError> {
        if let Some(compiled) = filter
            && compiled.table != table
        {
            return Err(AccessError::KindTableMismatch {
                kind: compiled.table.to_string(),
                table: table.to_string(),
            }
            .into());
        }

        let params = filter.map(|c| c.params.as_slice()).unwrap_or_default();
        let sql = select_statement(table, filter);

        match self.fetch_records(table, &sql, params).await {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(error = %e, %table, "JsonSQL read failed, retrying once");
                self.metrics.record_store_retry();
                Ok(self.fetch_records(table, &sql, params).await?)
            }
        }
    }

    async fn fetch_records(
        &self,
        table: Table,
        sql: &str,
        params: &[Literal],
    ) -> Result<Vec<Record>, StoreError> {
        let started = Instant::now();

        let records = match table {
            Table::Images => bind_params(sqlx::query_as::<_, Image>(sql), params)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(Record::Image)
                .collect(),
            Table::Suggestions => bind_params(sqlx::query_as::<_, Suggestion>(sql), params)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(Record::Suggestion)
                .collect(),
        };

        self.metrics
            .record_db_query(started.elapsed().as_secs_f64());
        Ok(records)
    }

    fn observe(&self, kind: &str, result: &Result<Vec<Record>, GateError>) {
        match result {
            Ok(records) => {
                debug!(kind, rows = records.len(), "JsonSQL query served");
                self.metrics.record_query(kind, "ok");
            }
            Err(e) if e.is_retryable() => {
                self.metrics.record_query(kind, "error");
            }
            Err(e) => {
                debug!(kind, rule = e.rule(), error = %e, "JsonSQL query rejected");
                self.metrics.record_query(kind, "rejected");
                self.metrics.record_rejection(e.rule());
            }
        }
    }
}

/// `SELECT <layout> FROM <table> [WHERE <fragment>]`.
fn select_statement(table: Table, filter: Option<&CompiledQuery>) -> String {
    let mut query = Query::select();
    query
        .columns(table.columns().iter().map(|column| Alias::new(*column)))
        .from(Alias::new(table.as_str()));

    if let Some(compiled) = filter {
        query.and_where(Expr::cust_with_values(
            compiled.sql.as_str(),
            compiled.params.iter().cloned().map(sea_query::Value::from),
        ));
    }

    let (sql, values) = query.build(SqliteQueryBuilder);
    debug_assert_eq!(
        values.0.len(),
        filter.map_or(0, |c| c.params.len()),
        "placeholder count diverged from compiled params"
    );
    sql
}

fn bind_params<'q, O>(
    mut query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    params: &'q [Literal],
) -> QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            Literal::String(s) => query.bind(s.as_str()),
            Literal::Integer(i) => query.bind(*i),
        };
    }
    query
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn unfiltered_select_uses_layout_order() {
        let sql = select_statement(Table::Images, None);
        assert_eq!(
            sql,
            r#"SELECT "creature", "imageID", "userID", "time", "ranking", "voted" FROM "images""#
        );
    }

    #[test]
    fn filtered_select_keeps_placeholders() {
        let compiled = CompiledQuery {
            table: Table::Suggestions,
            sql: "(userID = ? OR suggestion LIKE ?)".to_string(),
            params: vec![Literal::Integer(7), Literal::String("%owl%".to_string())],
        };
        let sql = select_statement(Table::Suggestions, Some(&compiled));

        assert!(sql.starts_with(r#"SELECT "suggestion", "userID", "time" FROM "suggestions" WHERE "#));
        assert!(sql.contains("userID = ?"));
        assert!(sql.contains("suggestion LIKE ?"));
        assert!(!sql.contains("owl"));
        assert_eq!(sql.matches('?').count(), 2);
    }

    #[test]
    fn records_serialize_with_store_names() {
        let record = Record::Image(Image {
            creature: "owlbear".into(),
            image_id: "abc".into(),
            user_id: 1,
            created_at: 100,
            ranking: 0,
            voted: 2,
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["imageID"], "abc");
        assert_eq!(json["userID"], 1);
        assert_eq!(json["createdAt"], 100);
        assert_eq!(json["voted"], 2);
    }
}
