//! Domain types for shopwatch.
//!
//! A tracked shop carries one lifecycle state per operation type. The
//! lifecycle states are the in-memory source of truth; the sortable index
//! keys derived from them (see `shopwatch-state`) exist for retrieval only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique shop identifier (a registrable domain, e.g. `example.com`).
pub type Domain = String;

/// Country partition a shop belongs to (e.g. `DE`).
pub type Country = String;

// ── Operations ─────────────────────────────────────────────────────

/// The closed set of operations shopwatch orchestrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// URL discovery for a shop.
    Crawl,
    /// Product-data extraction from already-discovered URLs.
    Scrape,
}

/// Static per-operation configuration, resolved once per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationSpec {
    pub operation: OperationType,
    /// Name of the queue this operation's work is dispatched to.
    pub queue_name: &'static str,
    /// Whether eligibility additionally requires a crawl completion newer
    /// than the latest scrape completion.
    pub requires_fresh_crawl: bool,
}

const CRAWL_SPEC: OperationSpec = OperationSpec {
    operation: OperationType::Crawl,
    queue_name: "shop-crawl",
    requires_fresh_crawl: false,
};

const SCRAPE_SPEC: OperationSpec = OperationSpec {
    operation: OperationType::Scrape,
    queue_name: "shop-scrape",
    requires_fresh_crawl: true,
};

impl OperationType {
    /// The accepted request values, in the order reported to clients.
    pub const ALLOWED: [&'static str; 2] = ["crawl", "scrape"];

    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::Crawl => "crawl",
            OperationType::Scrape => "scrape",
        }
    }

    /// Parse a request value. Returns `None` for anything outside the
    /// closed set; callers turn that into a client error carrying
    /// [`OperationType::ALLOWED`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "crawl" => Some(OperationType::Crawl),
            "scrape" => Some(OperationType::Scrape),
            _ => None,
        }
    }

    /// The static configuration for this operation.
    pub fn spec(self) -> &'static OperationSpec {
        match self {
            OperationType::Crawl => &CRAWL_SPEC,
            OperationType::Scrape => &SCRAPE_SPEC,
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Lifecycle ──────────────────────────────────────────────────────

/// Lifecycle of one operation for one shop.
///
/// Exactly one variant holds per (shop, operation) at any time. A
/// transition to `Completed` requires `finished_at >= started_at`; the
/// state store validates this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LifecycleState {
    /// The operation has never run for this shop.
    NeverRun,
    /// A worker picked the shop up and has not reported completion.
    InProgress { started_at: DateTime<Utc> },
    /// The last run completed.
    Completed {
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    },
}

impl LifecycleState {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, LifecycleState::InProgress { .. })
    }

    /// Completion instant of the last run, if any.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        match self {
            LifecycleState::Completed { finished_at, .. } => Some(*finished_at),
            _ => None,
        }
    }

    /// The most recent timestamp recorded in this state, used to enforce
    /// monotonically non-decreasing transitions.
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            LifecycleState::NeverRun => None,
            LifecycleState::InProgress { started_at } => Some(*started_at),
            LifecycleState::Completed { finished_at, .. } => Some(*finished_at),
        }
    }
}

// ── Shop record ────────────────────────────────────────────────────

/// A tracked shop: registry data plus one lifecycle per operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShopRecord {
    pub domain: Domain,
    pub country: Country,
    /// Normalized root name grouping regional variants (`example` for
    /// `example.com` and `example.de`). Derived at registration.
    pub core_domain_name: String,
    pub crawl: LifecycleState,
    pub scrape: LifecycleState,
    pub registered_at: DateTime<Utc>,
}

impl ShopRecord {
    pub fn lifecycle(&self, operation: OperationType) -> &LifecycleState {
        match operation {
            OperationType::Crawl => &self.crawl,
            OperationType::Scrape => &self.scrape,
        }
    }

    pub fn lifecycle_mut(&mut self, operation: OperationType) -> &mut LifecycleState {
        match operation {
            OperationType::Crawl => &mut self.crawl,
            OperationType::Scrape => &mut self.scrape,
        }
    }
}

// ── Orchestration request / result ─────────────────────────────────

/// An orchestration invocation as received from a client or schedule.
///
/// `operation` stays a raw string here so validation can report the
/// allowed values instead of failing at deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationRequest {
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cutoff_days: Option<i64>,
}

/// Explicit defaults applied to absent request fields. Constructed once
/// and passed in; never read from ambient state.
#[derive(Debug, Clone)]
pub struct OrchestrationDefaults {
    pub country: Country,
    pub cutoff_days: i64,
}

impl Default for OrchestrationDefaults {
    fn default() -> Self {
        Self {
            country: "DE".to_string(),
            cutoff_days: 2,
        }
    }
}

/// Counters accumulated while walking the eligibility index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityStats {
    /// Index entries scanned across both ranges.
    pub scanned: usize,
    /// Entries that passed all eligibility checks.
    pub eligible: usize,
    /// Entries skipped because a state key failed to decode.
    pub skipped_malformed: usize,
    /// Scrape candidates excluded because no crawl completion is newer
    /// than the latest scrape completion.
    pub filtered_no_fresh_crawl: usize,
}

/// Aggregated result of one orchestration invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationSummary {
    pub operation_type: OperationType,
    pub country: Country,
    /// The computed cutoff instant, ISO-8601.
    pub cutoff_date: String,
    pub shops_found: usize,
    pub shops_enqueued: usize,
    pub shops_failed: usize,
    pub failed_domains: Vec<Domain>,
    pub stats: EligibilityStats,
}
