//! Chat command surface.
//!
//! The chat transport (bot client, presence, dice and rules lookups) lives
//! outside this crate. It resolves the invoking member and calls into
//! [`CommandService`]; every error renders as the plain-text reply to send.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rand::seq::SliceRandom;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::Config;
use crate::error::StoreError;
use crate::jsonsql::{AccessGate, Caller, CompileError, GateError, Record};
use crate::metrics::Metrics;
use crate::models::Suggestion;
use crate::services::{RankingStore, VoteCandidate};

/// The member running a command, as resolved by the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoker {
    pub user_id: i64,
    pub role_ids: Vec<i64>,
}

impl Invoker {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            role_ids: Vec::new(),
        }
    }

    pub fn with_roles(mut self, role_ids: impl IntoIterator<Item = i64>) -> Self {
        self.role_ids.extend(role_ids);
        self
    }
}

/// Which members may run privileged commands.
#[derive(Debug, Clone, Default)]
pub struct PrivilegePolicy {
    accounts: HashSet<i64>,
    roles: HashSet<i64>,
}

impl PrivilegePolicy {
    pub fn new(
        accounts: impl IntoIterator<Item = i64>,
        roles: impl IntoIterator<Item = i64>,
    ) -> Self {
        Self {
            accounts: accounts.into_iter().collect(),
            roles: roles.into_iter().collect(),
        }
    }

    /// Listed account.
    pub fn is_privileged_account(&self, invoker: &Invoker) -> bool {
        self.accounts.contains(&invoker.user_id)
    }

    /// Listed account, or holder of a listed role.
    pub fn is_trusted(&self, invoker: &Invoker) -> bool {
        self.is_privileged_account(invoker)
            || invoker.role_ids.iter().any(|role| self.roles.contains(role))
    }
}

/// A voter's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Yes,
    No,
}

impl Vote {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vote::Yes => "yes",
            Vote::No => "no",
        }
    }
}

impl FromStr for Vote {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" => Ok(Vote::Yes),
            "no" | "n" => Ok(Vote::No),
            other => Err(CommandError::InvalidInput(format!(
                "vote must be yes or no, got '{other}'"
            ))),
        }
    }
}

/// Where the transport should write a freshly registered upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTicket {
    pub creature: String,
    pub image_id: String,
    /// `<images_dir>/<creature>/<image_id>.jpg`; the directory already exists.
    pub path: PathBuf,
}

/// Command failures. `Display` is the reply text.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Forbidden(&'static str),

    #[error("({url}) is an invalid url. URL not in allowed urls of {allowed:?}")]
    InvalidUrl { url: String, allowed: Vec<String> },

    #[error("{0}")]
    InvalidInput(String),

    #[error("no image with id '{0}'")]
    UnknownImage(String),

    #[error("JsonSQL error: {0}")]
    Gate(#[from] GateError),

    #[error("store failure")]
    Store(#[from] StoreError),

    #[error("failed to prepare image directory")]
    Io(#[from] std::io::Error),
}

/// Operations behind the chat commands.
#[derive(Debug, Clone)]
pub struct CommandService {
    gate: AccessGate,
    store: RankingStore,
    policy: PrivilegePolicy,
    allowed_image_urls: Vec<String>,
    basic_kind: String,
    images_dir: PathBuf,
    metrics: std::sync::Arc<Metrics>,
}

impl CommandService {
    pub fn new(
        gate: AccessGate,
        store: RankingStore,
        config: &Config,
        metrics: std::sync::Arc<Metrics>,
    ) -> Self {
        Self {
            gate,
            store,
            policy: PrivilegePolicy::new(
                config.privileged_accounts.iter().copied(),
                config.privileged_roles.iter().copied(),
            ),
            allowed_image_urls: config.allowed_image_urls.clone(),
            basic_kind: config.basic_db_kind.clone(),
            images_dir: config.images_dir.clone(),
            metrics,
        }
    }

    pub fn policy(&self) -> &PrivilegePolicy {
        &self.policy
    }

    /// Filtered read restricted to the configured basic query kind.
    pub async fn basic_db(&self, invoker: &Invoker, logic: &str) -> Result<Vec<Record>, CommandError> {
        let filter = parse_logic(logic)?;
        let table = self
            .gate
            .registry()
            .kind(&self.basic_kind)
            .and_then(|policy| policy.tables.iter().min().copied())
            .map(|table| table.as_str())
            .unwrap_or_default();

        let caller = Caller::Member(invoker.user_id);
        Ok(self
            .gate
            .execute(&caller, &self.basic_kind, table, &filter)
            .await?)
    }

    /// Filtered read against any allow-listed table. Privileged accounts only.
    pub async fn full_db(
        &self,
        invoker: &Invoker,
        logic: &str,
        table: &str,
    ) -> Result<Vec<Record>, CommandError> {
        if !self.policy.is_privileged_account(invoker) {
            warn!(user_id = invoker.user_id, "full_db refused");
            return Err(CommandError::Forbidden(
                "Not allowed to query the full database",
            ));
        }

        let filter = parse_logic(logic)?;
        Ok(self.gate.execute_privileged(table, &filter).await?)
    }

    /// Pick a random image from the less-voted half, if there is one.
    pub async fn vote_image(&self) -> Result<Option<VoteCandidate>, CommandError> {
        let candidates = self.store.bottom_voted().await?;
        Ok(candidates.choose(&mut rand::thread_rng()).cloned())
    }

    /// Record a vote. A yes also raises the ranking.
    pub async fn cast_vote(&self, image_id: &str, vote: Vote) -> Result<(), CommandError> {
        if !self.store.increment_votes(image_id).await? {
            return Err(CommandError::UnknownImage(image_id.to_string()));
        }
        if vote == Vote::Yes {
            self.store.increment_ranking(image_id).await?;
        }

        self.metrics.record_vote(vote.as_str());
        Ok(())
    }

    /// Issue a key to a trusted member. Returns the raw key, shown once.
    pub async fn generate_api_key(&self, invoker: &Invoker, name: &str) -> Result<String, CommandError> {
        if !self.policy.is_trusted(invoker) {
            return Err(CommandError::Forbidden("Not allowed to obtain key"));
        }
        Ok(self.store.add_api_key(invoker.user_id, name.trim()).await?)
    }

    /// Revoke every key of `target_user`. Privileged accounts only.
    pub async fn revoke_api_keys(&self, invoker: &Invoker, target_user: i64) -> Result<u64, CommandError> {
        if !self.policy.is_privileged_account(invoker) {
            return Err(CommandError::Forbidden(
                "You do not have permission to revoke API keys",
            ));
        }
        Ok(self.store.revoke_api_keys(target_user).await?)
    }

    /// Register an upload and prepare its directory.
    ///
    /// Downloading and writing the bytes is left to the transport.
    pub async fn upload_image(
        &self,
        invoker: &Invoker,
        creature: &str,
        image_url: &str,
    ) -> Result<UploadTicket, CommandError> {
        if !self.policy.is_trusted(invoker) {
            return Err(CommandError::Forbidden("Not allowed to upload images"));
        }
        if !self.is_allowed_image_url(image_url) {
            return Err(CommandError::InvalidUrl {
                url: image_url.to_string(),
                allowed: self.allowed_image_urls.clone(),
            });
        }

        let creature = normalize_creature(creature);
        if creature.is_empty() {
            return Err(CommandError::InvalidInput(
                "creature name must not be empty".to_string(),
            ));
        }

        let dir = self.images_dir.join(&creature);
        tokio::fs::create_dir_all(&dir).await?;

        let image_id = Uuid::now_v7().to_string();
        self.store
            .add_image(&creature, &image_id, invoker.user_id)
            .await?;

        info!(creature = %creature, image_id = %image_id, "upload registered");
        Ok(UploadTicket {
            path: image_path(&self.images_dir, &creature, &image_id),
            creature,
            image_id,
        })
    }

    pub async fn suggest(&self, invoker: &Invoker, text: &str) -> Result<Suggestion, CommandError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CommandError::InvalidInput(
                "suggestion must not be empty".to_string(),
            ));
        }
        Ok(self.store.add_suggestion(text, invoker.user_id).await?)
    }

    fn is_allowed_image_url(&self, image_url: &str) -> bool {
        let Ok(url) = Url::parse(image_url) else {
            return false;
        };
        self.allowed_image_urls
            .iter()
            .any(|prefix| url.as_str().starts_with(prefix.as_str()))
    }
}

/// `{"count": n, "data": [...]}`, as replied to the chat and the HTTP API.
pub fn records_payload(records: &[Record]) -> Value {
    json!({ "count": records.len(), "data": records })
}

/// Trim and replace path-significant characters with `_`.
pub fn normalize_creature(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | '.' => '_',
            other => other,
        })
        .collect()
}

/// On-disk location of an image.
pub fn image_path(images_dir: &Path, creature: &str, image_id: &str) -> PathBuf {
    images_dir.join(creature).join(format!("{image_id}.jpg"))
}

fn parse_logic(logic: &str) -> Result<Value, GateError> {
    serde_json::from_str(logic).map_err(|e| {
        CompileError::malformed("$", format!("invalid JSON: {e}")).into()
    })
}
