//! Lifecycle key codec.
//!
//! Encodes a [`LifecycleState`] into a sortable string key and decodes a
//! key back into lifecycle facts. The three tags partition the key space
//! into contiguous ASCII regions:
//!
//! ```text
//! DONE#<finished-at>     completed runs, chronological within the region
//! NEVER#                 never run — one bare literal, no timestamp
//! PROGRESS#<started-at>  in-flight runs
//! ```
//!
//! Timestamps are fixed-width zero-padded UTC at second precision
//! (`%Y-%m-%dT%H:%M:%SZ`), so lexicographic order equals chronological
//! order within a tag. The format never leaks past this module: the store
//! composes keys through [`encode`], consumers interpret them through
//! [`decode`].

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use thiserror::Error;

use shopwatch_core::LifecycleState;

/// The bare never-run key. Prefix-matches the entire never-run population
/// in one scan regardless of volume.
pub const NEVER_KEY: &str = "NEVER#";

/// Prefix of the completed-run region. The store builds range lower
/// bounds from it.
pub const DONE_PREFIX: &str = "DONE#";

const PROGRESS_PREFIX: &str = "PROGRESS#";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Which lifecycle region a decoded key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTag {
    Never,
    Progress,
    Done,
}

/// Decoded lifecycle facts: the tag plus the embedded timestamp
/// (`None` only for [`StateTag::Never`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSnapshot {
    pub tag: StateTag,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A key that does not decode. Consumers skip the entry and count it as a
/// data-integrity warning; decoding failures are never fatal for a run.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unrecognized state tag in key `{0}`")]
    UnknownTag(String),

    #[error("malformed timestamp `{value}` in state key")]
    BadTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("never-run key carries trailing data: `{0}`")]
    TrailingData(String),
}

/// Format an instant in the fixed-width key format, truncating to whole
/// seconds.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.trunc_subsecs(0).format(TIMESTAMP_FORMAT).to_string()
}

/// Truncate an instant to the codec's second precision. Range bounds must
/// go through this so the `finished_at == cutoff` boundary stays inclusive.
pub fn truncate_to_seconds(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(0)
}

/// Encode a lifecycle state as a sortable key.
pub fn encode(state: &LifecycleState) -> String {
    match state {
        LifecycleState::NeverRun => NEVER_KEY.to_string(),
        LifecycleState::InProgress { started_at } => {
            format!("{PROGRESS_PREFIX}{}", format_timestamp(*started_at))
        }
        LifecycleState::Completed { finished_at, .. } => {
            format!("{DONE_PREFIX}{}", format_timestamp(*finished_at))
        }
    }
}

/// Encode the completed-run key for a given finish instant. Used to build
/// range upper bounds.
pub fn done_key(finished_at: DateTime<Utc>) -> String {
    format!("{DONE_PREFIX}{}", format_timestamp(finished_at))
}

/// Decode a key back into lifecycle facts. Pure; no I/O.
pub fn decode(key: &str) -> Result<StateSnapshot, CodecError> {
    if let Some(rest) = key.strip_prefix(NEVER_KEY) {
        if !rest.is_empty() {
            return Err(CodecError::TrailingData(key.to_string()));
        }
        return Ok(StateSnapshot {
            tag: StateTag::Never,
            timestamp: None,
        });
    }
    if let Some(rest) = key.strip_prefix(PROGRESS_PREFIX) {
        return Ok(StateSnapshot {
            tag: StateTag::Progress,
            timestamp: Some(parse_timestamp(rest)?),
        });
    }
    if let Some(rest) = key.strip_prefix(DONE_PREFIX) {
        return Ok(StateSnapshot {
            tag: StateTag::Done,
            timestamp: Some(parse_timestamp(rest)?),
        });
    }
    Err(CodecError::UnknownTag(key.to_string()))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, CodecError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|source| CodecError::BadTimestamp {
            value: value.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
    }

    #[test]
    fn encode_never_is_bare_literal() {
        assert_eq!(encode(&LifecycleState::NeverRun), "NEVER#");
    }

    #[test]
    fn encode_embeds_fixed_width_timestamps() {
        let started = at(9, 5, 3);
        assert_eq!(
            encode(&LifecycleState::InProgress { started_at: started }),
            "PROGRESS#2024-05-01T09:05:03Z"
        );
        assert_eq!(
            encode(&LifecycleState::Completed {
                started_at: started,
                finished_at: at(10, 0, 0)
            }),
            "DONE#2024-05-01T10:00:00Z"
        );
    }

    #[test]
    fn subsecond_precision_is_truncated() {
        let ts = at(12, 0, 0) + chrono::Duration::milliseconds(750);
        let state = LifecycleState::Completed {
            started_at: ts,
            finished_at: ts,
        };
        assert_eq!(encode(&state), "DONE#2024-05-01T12:00:00Z");
    }

    #[test]
    fn decode_round_trips() {
        let snapshot = decode("DONE#2024-05-01T10:00:00Z").unwrap();
        assert_eq!(snapshot.tag, StateTag::Done);
        assert_eq!(snapshot.timestamp, Some(at(10, 0, 0)));

        let snapshot = decode("PROGRESS#2024-05-01T09:05:03Z").unwrap();
        assert_eq!(snapshot.tag, StateTag::Progress);
        assert_eq!(snapshot.timestamp, Some(at(9, 5, 3)));

        let snapshot = decode("NEVER#").unwrap();
        assert_eq!(snapshot.tag, StateTag::Never);
        assert_eq!(snapshot.timestamp, None);
    }

    #[test]
    fn decode_rejects_malformed_keys() {
        assert!(matches!(decode("NEVER"), Err(CodecError::UnknownTag(_))));
        assert!(matches!(
            decode("NEVER#2024-05-01T10:00:00Z"),
            Err(CodecError::TrailingData(_))
        ));
        assert!(matches!(
            decode("DONE#not-a-timestamp"),
            Err(CodecError::BadTimestamp { .. })
        ));
        assert!(matches!(decode(""), Err(CodecError::UnknownTag(_))));
        assert!(matches!(
            decode("RUNNING#2024-05-01T10:00:00Z"),
            Err(CodecError::UnknownTag(_))
        ));
    }

    #[test]
    fn tags_partition_the_key_space() {
        // ASCII gives DONE < NEVER < PROGRESS, so each tag is contiguous.
        let done = done_key(at(23, 59, 59));
        let progress = encode(&LifecycleState::InProgress { started_at: at(0, 0, 0) });
        assert!(done.as_str() < NEVER_KEY);
        assert!(NEVER_KEY < progress.as_str());
    }

    #[test]
    fn lexicographic_order_is_chronological_within_a_tag() {
        let earlier = done_key(at(10, 0, 0));
        let later = done_key(at(10, 0, 1));
        let much_later = done_key(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert!(earlier < later);
        assert!(later < much_later);
    }
}
