//! redb table definitions for the shopwatch state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized types).
//! Index keys are composite: `{country}#{state-key}#{domain}`, where the
//! state-key segment comes from the lifecycle codec. Country codes never
//! contain `#`.

use redb::TableDefinition;

/// Shop records keyed by `{domain}`.
pub const SHOPS: TableDefinition<&str, &[u8]> = TableDefinition::new("shops");

/// Crawl lifecycle index keyed by `{country}#{crawl-state-key}#{domain}`.
pub const CRAWL_INDEX: TableDefinition<&str, &[u8]> = TableDefinition::new("crawl_index");

/// Scrape lifecycle index keyed by `{country}#{scrape-state-key}#{domain}`.
pub const SCRAPE_INDEX: TableDefinition<&str, &[u8]> = TableDefinition::new("scrape_index");
