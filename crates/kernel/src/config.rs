//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::jsonsql::{CompileLimits, DEFAULT_MAX_DEPTH, DEFAULT_MAX_NODES};

/// Image hosts accepted by the upload command when none are configured.
pub const DEFAULT_ALLOWED_IMAGE_URLS: &[&str] =
    &["https://cdn.discordapp.com/", "https://media.discordapp.net/"];

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 8080).
    pub port: u16,

    /// SQLite connection URL (default: sqlite://database/images.db).
    pub database_url: String,

    /// Maximum database connections in pool (default: 5).
    pub database_max_connections: u32,

    /// Allow-list TOML file. When None, the embedded default is used.
    pub allowlist_path: Option<PathBuf>,

    /// Root of the on-disk image tree, laid out as `<creature>/<imageID>.jpg`.
    pub images_dir: PathBuf,

    /// Accounts allowed to run privileged commands.
    pub privileged_accounts: Vec<i64>,

    /// Roles allowed to issue API keys.
    pub privileged_roles: Vec<i64>,

    /// URL prefixes accepted for image uploads.
    pub allowed_image_urls: Vec<String>,

    /// Query kind used by the basic database command.
    pub basic_db_kind: String,

    /// Maximum JsonSQL expression nesting depth.
    pub max_expression_depth: usize,

    /// Maximum JsonSQL expression node count.
    pub max_expression_nodes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://database/images.db".to_string());

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let allowlist_path = env::var("ALLOWLIST_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let images_dir = env::var("IMAGES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./images"));

        let privileged_accounts = parse_id_list("PRIVILEGED_ACCOUNTS")?;
        let privileged_roles = parse_id_list("PRIVILEGED_ROLES")?;

        let allowed_image_urls = env::var("ALLOWED_IMAGE_URLS")
            .map(|v| split_list(&v))
            .unwrap_or_else(|_| {
                DEFAULT_ALLOWED_IMAGE_URLS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        let basic_db_kind =
            env::var("BASIC_DB_KIND").unwrap_or_else(|_| "get_image_data".to_string());

        let max_expression_depth = env::var("MAX_EXPRESSION_DEPTH")
            .unwrap_or_else(|_| DEFAULT_MAX_DEPTH.to_string())
            .parse()
            .context("MAX_EXPRESSION_DEPTH must be a valid usize")?;

        let max_expression_nodes = env::var("MAX_EXPRESSION_NODES")
            .unwrap_or_else(|_| DEFAULT_MAX_NODES.to_string())
            .parse()
            .context("MAX_EXPRESSION_NODES must be a valid usize")?;

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            allowlist_path,
            images_dir,
            privileged_accounts,
            privileged_roles,
            allowed_image_urls,
            basic_db_kind,
            max_expression_depth,
            max_expression_nodes,
        })
    }

    /// Configuration for an in-memory store with embedded defaults.
    ///
    /// Used by tests and tools that never touch the environment.
    pub fn in_memory() -> Self {
        Self {
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            database_max_connections: 1,
            allowlist_path: None,
            images_dir: PathBuf::from("./images"),
            privileged_accounts: Vec::new(),
            privileged_roles: Vec::new(),
            allowed_image_urls: DEFAULT_ALLOWED_IMAGE_URLS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            basic_db_kind: "get_image_data".to_string(),
            max_expression_depth: DEFAULT_MAX_DEPTH,
            max_expression_nodes: DEFAULT_MAX_NODES,
        }
    }

    pub fn compile_limits(&self) -> CompileLimits {
        CompileLimits {
            max_depth: self.max_expression_depth,
            max_nodes: self.max_expression_nodes,
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_id_list(var: &str) -> Result<Vec<i64>> {
    let Ok(value) = env::var(var) else {
        return Ok(Vec::new());
    };

    split_list(&value)
        .iter()
        .map(|id| {
            id.parse::<i64>()
                .with_context(|| format!("{var} must be a comma-separated list of integer ids"))
        })
        .collect()
}
