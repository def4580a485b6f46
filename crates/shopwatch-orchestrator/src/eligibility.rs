//! The eligibility query engine.
//!
//! [`EligibilityCursor`] is an async pull-cursor over one operation's
//! index partition. It walks the never-run region first, then the
//! completed region up to the cutoff, following continuation tokens
//! transparently so callers see a single stream of eligible shops.
//!
//! An entry whose lifecycle key fails to decode is skipped and counted,
//! never fatal; a store failure aborts the whole query.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::warn;

use shopwatch_core::ports::{EligibilityIndex, IndexEntry, IndexError};
use shopwatch_core::types::{EligibilityStats, OperationType};
use shopwatch_state::codec::{self, StateSnapshot, StateTag};

/// Page size requested from the index per scan call.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// A shop the cursor judged due for the scanned operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibleShop {
    pub domain: String,
    pub country: String,
    /// Decoded lifecycle of the scanned operation.
    pub snapshot: StateSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NeverRun,
    Completed,
    Exhausted,
}

impl Phase {
    fn advance(self) -> Self {
        match self {
            Phase::NeverRun => Phase::Completed,
            Phase::Completed | Phase::Exhausted => Phase::Exhausted,
        }
    }
}

/// Start a cursor over `operation`'s index for one country partition.
///
/// `cutoff` bounds the completed region inclusively: shops whose last
/// completion is at or before it are due, newer ones are not.
pub fn find_eligible<'a>(
    index: &'a dyn EligibilityIndex,
    operation: OperationType,
    country: &str,
    cutoff: DateTime<Utc>,
) -> EligibilityCursor<'a> {
    EligibilityCursor {
        index,
        operation,
        country: country.to_owned(),
        cutoff,
        page_size: DEFAULT_PAGE_SIZE,
        phase: Phase::NeverRun,
        after: None,
        buffer: VecDeque::new(),
        stats: EligibilityStats::default(),
    }
}

/// Pull-cursor over eligible shops. See the module docs for ordering.
pub struct EligibilityCursor<'a> {
    index: &'a dyn EligibilityIndex,
    operation: OperationType,
    country: String,
    cutoff: DateTime<Utc>,
    page_size: usize,
    phase: Phase,
    after: Option<String>,
    buffer: VecDeque<IndexEntry>,
    stats: EligibilityStats,
}

impl EligibilityCursor<'_> {
    /// Counters accumulated so far. Final once `next` has returned `None`.
    pub fn stats(&self) -> EligibilityStats {
        self.stats
    }

    /// Advance to the next eligible shop, fetching index pages as needed.
    pub async fn next(&mut self) -> Result<Option<EligibleShop>, IndexError> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                self.stats.scanned += 1;
                if let Some(shop) = self.evaluate(&entry) {
                    self.stats.eligible += 1;
                    return Ok(Some(shop));
                }
                continue;
            }
            if !self.fill_buffer().await? {
                return Ok(None);
            }
        }
    }

    /// Fetch pages until the buffer has entries or both regions are
    /// exhausted. Returns false only in the latter case.
    async fn fill_buffer(&mut self) -> Result<bool, IndexError> {
        while self.buffer.is_empty() {
            let page = match self.phase {
                Phase::NeverRun => {
                    self.index
                        .scan_never_run(
                            self.operation,
                            &self.country,
                            self.after.as_deref(),
                            self.page_size,
                        )
                        .await?
                }
                Phase::Completed => {
                    self.index
                        .scan_completed_until(
                            self.operation,
                            &self.country,
                            self.cutoff,
                            self.after.as_deref(),
                            self.page_size,
                        )
                        .await?
                }
                Phase::Exhausted => return Ok(false),
            };
            match page.next {
                Some(token) => self.after = Some(token),
                None => {
                    self.after = None;
                    self.phase = self.phase.advance();
                }
            }
            self.buffer.extend(page.entries);
        }
        Ok(true)
    }

    /// Decode and judge one entry, updating counters for non-eligible
    /// outcomes.
    fn evaluate(&mut self, entry: &IndexEntry) -> Option<EligibleShop> {
        let snapshot = match codec::decode(&entry.state_key) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(domain = %entry.domain, key = %entry.state_key, error = %err,
                      "skipping index entry with undecodable lifecycle key");
                self.stats.skipped_malformed += 1;
                return None;
            }
        };
        // The scanned ranges exclude the in-progress region by key
        // construction; an entry that decodes this way is corrupt.
        if snapshot.tag == StateTag::Progress {
            warn!(domain = %entry.domain, key = %entry.state_key,
                  "skipping in-progress key inside a scanned range");
            self.stats.skipped_malformed += 1;
            return None;
        }
        if self.operation.spec().requires_fresh_crawl && !self.has_fresh_crawl(entry)? {
            return None;
        }
        Some(EligibleShop {
            domain: entry.domain.clone(),
            country: entry.country.clone(),
            snapshot,
        })
    }

    /// Scrape refinement, answered from the projected keys alone: the
    /// crawl must be completed, and the shop either never scraped or
    /// scraped before that crawl finished. `None` marks the entry
    /// malformed (caller drops it).
    fn has_fresh_crawl(&mut self, entry: &IndexEntry) -> Option<bool> {
        let (crawl, scrape) = match (codec::decode(&entry.crawl_key), codec::decode(&entry.scrape_key))
        {
            (Ok(crawl), Ok(scrape)) => (crawl, scrape),
            (crawl, scrape) => {
                let err = crawl.err().or(scrape.err());
                warn!(domain = %entry.domain, error = ?err,
                      "skipping index entry with undecodable projection keys");
                self.stats.skipped_malformed += 1;
                return None;
            }
        };
        let fresh = match (crawl.tag, scrape.tag) {
            (StateTag::Done, StateTag::Never) => true,
            (StateTag::Done, StateTag::Done) => scrape.timestamp < crawl.timestamp,
            _ => false,
        };
        if !fresh {
            self.stats.filtered_no_fresh_crawl += 1;
        }
        Some(fresh)
    }
}
