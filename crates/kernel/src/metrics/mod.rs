//! Prometheus metrics collection.
//!
//! Provides application metrics in Prometheus format.

use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

/// JsonSQL query labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct QueryLabels {
    pub kind: String,
    pub outcome: String,
}

/// JsonSQL rejection labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RejectionLabels {
    pub rule: String,
}

/// Vote labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct VoteLabels {
    pub choice: String,
}

/// Application metrics.
pub struct Metrics {
    registry: Registry,

    /// JsonSQL queries by query kind and outcome.
    pub jsonsql_queries: Family<QueryLabels, Counter>,

    /// JsonSQL rejections by violated rule.
    pub jsonsql_rejections: Family<RejectionLabels, Counter>,

    /// Votes cast by choice.
    pub votes: Family<VoteLabels, Counter>,

    /// JsonSQL reads retried after a store failure.
    pub jsonsql_store_retries: Counter,

    /// Database query duration.
    pub db_query_duration_seconds: Histogram,
}

impl Metrics {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let jsonsql_queries = Family::<QueryLabels, Counter>::default();
        registry.register(
            "jsonsql_queries",
            "JsonSQL queries by kind and outcome",
            jsonsql_queries.clone(),
        );

        let jsonsql_rejections = Family::<RejectionLabels, Counter>::default();
        registry.register(
            "jsonsql_rejections",
            "JsonSQL rejections by violated rule",
            jsonsql_rejections.clone(),
        );

        let jsonsql_store_retries = Counter::default();
        registry.register(
            "jsonsql_store_retries",
            "JsonSQL reads retried after a store failure",
            jsonsql_store_retries.clone(),
        );

        let votes = Family::<VoteLabels, Counter>::default();
        registry.register("votes", "Votes cast by choice", votes.clone());

        let db_query_duration_seconds = Histogram::new(exponential_buckets(0.0001, 2.0, 14));
        registry.register(
            "db_query_duration_seconds",
            "Database query duration in seconds",
            db_query_duration_seconds.clone(),
        );

        Self {
            registry,
            jsonsql_queries,
            jsonsql_rejections,
            jsonsql_store_retries,
            votes,
            db_query_duration_seconds,
        }
    }

    /// Record a finished JsonSQL query.
    pub fn record_query(&self, kind: &str, outcome: &str) {
        self.jsonsql_queries
            .get_or_create(&QueryLabels {
                kind: kind.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    /// Record a JsonSQL rejection.
    pub fn record_rejection(&self, rule: &str) {
        self.jsonsql_rejections
            .get_or_create(&RejectionLabels {
                rule: rule.to_string(),
            })
            .inc();
    }

    pub fn record_store_retry(&self) {
        self.jsonsql_store_retries.inc();
    }

    /// Record a vote.
    pub fn record_vote(&self, choice: &str) {
        self.votes
            .get_or_create(&VoteLabels {
                choice: choice.to_string(),
            })
            .inc();
    }

    /// Record a database query.
    pub fn record_db_query(&self, duration_secs: f64) {
        self.db_query_duration_seconds.observe(duration_secs);
    }

    /// Encode metrics in Prometheus text format.
    ///
    /// # Panics
    ///
    /// Panics if Prometheus metric encoding to a `String` buffer fails.
    /// The `fmt::Write` impl for `String` is infallible, and all metric
    /// labels use derived `EncodeLabelSet` impls that do not produce
    /// `fmt::Error`.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        // Prometheus encoding to String buffer is infallible
        #[allow(clippy::expect_used)]
        encode(&mut buffer, &self.registry).expect("encoding metrics");
        buffer
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish()
    }
}
