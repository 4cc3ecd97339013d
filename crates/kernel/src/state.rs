//! Application state shared across all handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::info;

use crate::commands::CommandService;
use crate::config::Config;
use crate::db;
use crate::jsonsql::{AccessGate, AllowListRegistry};
use crate::metrics::Metrics;
use crate::services::RankingStore;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// SQLite connection pool.
    db: SqlitePool,

    /// Immutable JsonSQL allow-list.
    registry: Arc<AllowListRegistry>,

    /// Gate for every generic filtered read.
    gate: AccessGate,

    /// Ranking and vote store.
    ranking: RankingStore,

    /// Chat command operations.
    commands: CommandService,

    /// Prometheus metrics.
    metrics: Arc<Metrics>,

    /// Root of the on-disk image tree.
    images_dir: PathBuf,
}

impl AppState {
    /// Open the store, apply migrations and load the allow-list.
    pub async fn new(config: &Config) -> Result<Self> {
        let pool = db::create_pool(config)
            .await
            .context("failed to create database pool")?;
        info!(url = %config.database_url, "Connected to SQLite");

        Self::with_pool(config, pool).await
    }

    /// Build state around an existing pool (migrations are still applied).
    pub async fn with_pool(config: &Config, pool: SqlitePool) -> Result<Self> {
        db::run_migrations(&pool).await?;
        info!("Database migrations applied");

        let registry = Arc::new(
            AllowListRegistry::load(config.allowlist_path.as_deref())
                .context("failed to load JsonSQL allow-list")?,
        );
        info!(
            path = ?config.allowlist_path,
            "JsonSQL allow-list loaded"
        );

        let metrics = Arc::new(Metrics::new());
        let gate = AccessGate::new(registry.clone(), pool.clone(), metrics.clone())
            .with_limits(config.compile_limits());
        let ranking = RankingStore::new(pool.clone());
        let commands = CommandService::new(gate.clone(), ranking.clone(), config, metrics.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                db: pool,
                registry,
                gate,
                ranking,
                commands,
                metrics,
                images_dir: config.images_dir.clone(),
            }),
        })
    }

    /// Get the database pool.
    pub fn db(&self) -> &SqlitePool {
        &self.inner.db
    }

    /// Get the JsonSQL allow-list.
    pub fn registry(&self) -> &AllowListRegistry {
        &self.inner.registry
    }

    /// Get the access gate.
    pub fn gate(&self) -> &AccessGate {
        &self.inner.gate
    }

    /// Get the ranking store.
    pub fn ranking(&self) -> &RankingStore {
        &self.inner.ranking
    }

    /// Get the chat command service.
    pub fn commands(&self) -> &CommandService {
        &self.inner.commands
    }

    /// Get the metrics registry.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }

    pub fn images_dir(&self) -> &Path {
        &self.inner.images_dir
    }

    /// Check if the database is healthy.
    pub async fn db_healthy(&self) -> bool {
        db::check_health(&self.inner.db).await
    }
}
