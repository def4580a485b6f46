//! ShopStateStore — redb-backed shop registry and lifecycle indexes.
//!
//! The shop record is the source of truth; the per-operation index rows
//! are derived from it and regenerated in the same write transaction as
//! every lifecycle mutation. Eligibility queries read only the indexes.
//! The store supports both on-disk and in-memory backends (the latter for
//! testing).

use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use tracing::{debug, info};

use shopwatch_core::{
    EligibilityIndex, IndexEntry, IndexError, IndexPage, LifecycleState, OperationType,
    ShopRecord, core_domain_name,
};

use crate::codec;
use crate::error::{StateError, StateResult};
use crate::tables::{CRAWL_INDEX, SCRAPE_INDEX, SHOPS};

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Which index table serves an operation.
fn index_table(operation: OperationType) -> TableDefinition<'static, &'static str, &'static [u8]> {
    match operation {
        OperationType::Crawl => CRAWL_INDEX,
        OperationType::Scrape => SCRAPE_INDEX,
    }
}

/// Compose the full index key for one operation of one shop.
fn index_key(country: &str, state_key: &str, domain: &str) -> String {
    format!("{country}#{state_key}#{domain}")
}

/// Upper bound admitting every key that continues `prefix` with `#…`.
///
/// `'$'` is `'#' + 1` in ASCII, so `{prefix}#anything < {prefix}$` while
/// any key whose timestamp segment sorts after the prefix stays excluded.
fn upper_bound(prefix: &str) -> String {
    format!("{prefix}$")
}

/// Thread-safe shop state store backed by redb.
#[derive(Clone)]
pub struct ShopStateStore {
    db: Arc<Database>,
}

impl ShopStateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "shop state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory shop state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SHOPS).map_err(map_err!(Table))?;
        txn.open_table(CRAWL_INDEX).map_err(map_err!(Table))?;
        txn.open_table(SCRAPE_INDEX).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Registry ───────────────────────────────────────────────────

    /// Register a shop. Idempotent: re-registering an existing shop with
    /// the same country returns the existing record untouched; a
    /// different country is rejected (country is immutable).
    pub fn register_shop(&self, domain: &str, country: &str) -> StateResult<ShopRecord> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;

        if let Some(existing) = read_record(&txn, domain)? {
            if existing.country != country {
                return Err(StateError::CountryImmutable(domain.to_string()));
            }
            debug!(%domain, "shop already registered");
            return Ok(existing);
        }

        let record = ShopRecord {
            domain: domain.to_string(),
            country: country.to_string(),
            core_domain_name: core_domain_name(domain),
            crawl: LifecycleState::NeverRun,
            scrape: LifecycleState::NeverRun,
            registered_at: Utc::now(),
        };
        write_record(&txn, None, &record)?;
        txn.commit().map_err(map_err!(Transaction))?;

        info!(%domain, %country, "shop registered");
        Ok(record)
    }

    /// Get a shop by domain.
    pub fn get_shop(&self, domain: &str) -> StateResult<Option<ShopRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SHOPS).map_err(map_err!(Table))?;
        match table.get(domain).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: ShopRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List all tracked shops.
    pub fn list_shops(&self) -> StateResult<Vec<ShopRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SHOPS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: ShopRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    /// Delete a shop and its index rows. Returns true if it existed.
    pub fn delete_shop(&self, domain: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;

        let Some(record) = read_record(&txn, domain)? else {
            return Ok(false);
        };
        {
            let mut shops = txn.open_table(SHOPS).map_err(map_err!(Table))?;
            shops.remove(domain).map_err(map_err!(Write))?;
        }
        for operation in [OperationType::Crawl, OperationType::Scrape] {
            let mut table = txn.open_table(index_table(operation)).map_err(map_err!(Table))?;
            let key = index_key(
                &record.country,
                &codec::encode(record.lifecycle(operation)),
                &record.domain,
            );
            table.remove(key.as_str()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;

        debug!(%domain, "shop deleted");
        Ok(true)
    }

    // ── Lifecycle transitions ──────────────────────────────────────

    /// Record that a worker started an operation for a shop.
    ///
    /// Rejected while a run is already in progress, and rejected if
    /// `started_at` precedes the last recorded timestamp (timestamps are
    /// monotonically non-decreasing per operation).
    pub fn record_started(
        &self,
        domain: &str,
        operation: OperationType,
        started_at: DateTime<Utc>,
    ) -> StateResult<ShopRecord> {
        self.transition(domain, operation, |current| match current {
            LifecycleState::InProgress { .. } => Err("a run is already in progress".to_string()),
            _ => {
                if let Some(prev) = current.latest_timestamp()
                    && started_at < prev
                {
                    return Err(format!(
                        "started_at {started_at} precedes the last recorded timestamp {prev}"
                    ));
                }
                Ok(LifecycleState::InProgress { started_at })
            }
        })
    }

    /// Record that the in-progress run of an operation finished.
    ///
    /// Requires a run in progress with `finished_at >= started_at`.
    pub fn record_finished(
        &self,
        domain: &str,
        operation: OperationType,
        finished_at: DateTime<Utc>,
    ) -> StateResult<ShopRecord> {
        self.transition(domain, operation, |current| match current {
            LifecycleState::InProgress { started_at } if finished_at >= *started_at => {
                Ok(LifecycleState::Completed {
                    started_at: *started_at,
                    finished_at,
                })
            }
            LifecycleState::InProgress { started_at } => Err(format!(
                "finished_at {finished_at} precedes started_at {started_at}"
            )),
            _ => Err("no run in progress".to_string()),
        })
    }

    /// Apply a validated lifecycle transition and regenerate the derived
    /// index rows in the same transaction.
    fn transition(
        &self,
        domain: &str,
        operation: OperationType,
        next: impl FnOnce(&LifecycleState) -> Result<LifecycleState, String>,
    ) -> StateResult<ShopRecord> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;

        let old = read_record(&txn, domain)?
            .ok_or_else(|| StateError::ShopNotFound(domain.to_string()))?;
        let new_state =
            next(old.lifecycle(operation)).map_err(|reason| StateError::InvalidTransition {
                domain: domain.to_string(),
                operation,
                reason,
            })?;

        let mut updated = old.clone();
        *updated.lifecycle_mut(operation) = new_state;
        write_record(&txn, Some(&old), &updated)?;
        txn.commit().map_err(map_err!(Transaction))?;

        debug!(%domain, %operation, state = ?new_state, "lifecycle recorded");
        Ok(updated)
    }

    // ── Index scans ────────────────────────────────────────────────

    /// Scan one index over `[lower, upper)` in ascending key order,
    /// resuming after an opaque continuation token.
    fn scan_index(
        &self,
        operation: OperationType,
        lower: &str,
        upper: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<IndexPage, IndexError> {
        let limit = limit.max(1);
        let txn = self
            .db
            .begin_read()
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        let table = txn
            .open_table(index_table(operation))
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        let start = match after {
            Some(token) => Bound::Excluded(token),
            None => Bound::Included(lower),
        };
        let iter = table
            .range::<&str>((start, Bound::Excluded(upper)))
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        let mut entries = Vec::new();
        let mut last_key = None;
        for item in iter {
            let (key, value) = item.map_err(|e| IndexError::Storage(e.to_string()))?;
            let entry: IndexEntry = serde_json::from_slice(value.value())
                .map_err(|e| IndexError::Deserialize(e.to_string()))?;
            entries.push(entry);
            last_key = Some(key.value().to_string());
            if entries.len() >= limit {
                break;
            }
        }

        let next = if entries.len() >= limit { last_key } else { None };
        Ok(IndexPage { entries, next })
    }
}

#[async_trait]
impl EligibilityIndex for ShopStateStore {
    async fn scan_never_run(
        &self,
        operation: OperationType,
        country: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<IndexPage, IndexError> {
        let lower = format!("{country}#{}", codec::NEVER_KEY);
        let upper = upper_bound(&lower);
        self.scan_index(operation, &lower, &upper, after, limit)
    }

    async fn scan_completed_until(
        &self,
        operation: OperationType,
        country: &str,
        cutoff: DateTime<Utc>,
        after: Option<&str>,
        limit: usize,
    ) -> Result<IndexPage, IndexError> {
        let lower = format!("{country}#{}", codec::DONE_PREFIX);
        // Inclusive of finishes in the cutoff second itself.
        let upper = upper_bound(&format!("{country}#{}", codec::done_key(cutoff)));
        self.scan_index(operation, &lower, &upper, after, limit)
    }
}

// ── Transaction helpers ────────────────────────────────────────────

fn read_record(txn: &WriteTransaction, domain: &str) -> StateResult<Option<ShopRecord>> {
    let table = txn.open_table(SHOPS).map_err(map_err!(Table))?;
    match table.get(domain).map_err(map_err!(Read))? {
        Some(guard) => {
            let record: ShopRecord =
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
            Ok(Some(record))
        }
        None => Ok(None),
    }
}

/// Write the shop record and both derived index rows; removes the rows
/// derived from `old` first so a lifecycle change never leaves a stale
/// key behind.
fn write_record(
    txn: &WriteTransaction,
    old: Option<&ShopRecord>,
    new: &ShopRecord,
) -> StateResult<()> {
    {
        let mut shops = txn.open_table(SHOPS).map_err(map_err!(Table))?;
        let value = serde_json::to_vec(new).map_err(map_err!(Serialize))?;
        shops
            .insert(new.domain.as_str(), value.as_slice())
            .map_err(map_err!(Write))?;
    }

    for operation in [OperationType::Crawl, OperationType::Scrape] {
        let mut table = txn.open_table(index_table(operation)).map_err(map_err!(Table))?;

        if let Some(old) = old {
            let old_key = index_key(
                &old.country,
                &codec::encode(old.lifecycle(operation)),
                &old.domain,
            );
            table.remove(old_key.as_str()).map_err(map_err!(Write))?;
        }

        let state_key = codec::encode(new.lifecycle(operation));
        let entry = IndexEntry {
            domain: new.domain.clone(),
            country: new.country.clone(),
            state_key: state_key.clone(),
            crawl_key: codec::encode(&new.crawl),
            scrape_key: codec::encode(&new.scrape),
        };
        let value = serde_json::to_vec(&entry).map_err(map_err!(Serialize))?;
        let key = index_key(&new.country, &state_key, &new.domain);
        table
            .insert(key.as_str(), value.as_slice())
            .map_err(map_err!(Write))?;
    }

    Ok(())
}
