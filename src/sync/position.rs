//! Total order over ledger positions.
//!
//! Positions order by event sequence first; equal sequences (distinct transactions) break ties by
//! byte-wise comparison of the transaction digest. The genesis sentinel precedes every real
//! position, and an absent position (`None`) precedes everything including genesis.

use crate::indexer::EventId;
use crate::utils::short_digest;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Digest recorded for the genesis sentinel.
pub const GENESIS_TX_DIGEST: &str =
	"0x0000000000000000000000000000000000000000000000000000000000000000";
/// Sequence recorded for the genesis sentinel.
pub const GENESIS_SEQ: i64 = -1;

impl Ord for EventId {
	fn cmp(&self, other: &Self) -> Ordering {
		self.event_seq
			.cmp(&other.event_seq)
			.then_with(|| self.tx_digest.as_bytes().cmp(other.tx_digest.as_bytes()))
	}
}

impl PartialOrd for EventId {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

/// A point in the remote event stream.
///
/// Variant order matters: the derived `Ord` places `Genesis` before every `At`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Position {
	/// Nothing ingested yet.
	Genesis,
	/// The event with this id is the last one fully persisted.
	At(EventId),
}

impl Position {
	pub fn at(tx_digest: impl Into<String>, event_seq: u64) -> Self {
		Position::At(EventId::new(tx_digest, event_seq))
	}

	/// `self` comes strictly after `other`.
	pub fn is_after(&self, other: &Position) -> bool {
		self > other
	}

	/// `self` comes at or before `other`.
	pub fn is_at_or_before(&self, other: &Position) -> bool {
		self <= other
	}

	/// Remote pagination cursor for resuming after this position; genesis starts from the
	/// beginning of the stream.
	pub fn pagination_cursor(&self) -> Option<EventId> {
		match self {
			Position::Genesis => None,
			Position::At(id) => Some(id.clone()),
		}
	}
}

impl From<EventId> for Position {
	fn from(id: EventId) -> Self {
		Position::At(id)
	}
}

impl fmt::Display for Position {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Position::Genesis => write!(f, "genesis"),
			Position::At(id) => write!(f, "{}… #{}", short_digest(&id.tx_digest), id.event_seq),
		}
	}
}

/// Compare two possibly absent positions; absent is the smallest.
pub fn compare(a: Option<&Position>, b: Option<&Position>) -> Ordering {
	a.cmp(&b)
}

/// `a` comes strictly after `b`.
pub fn is_after(a: Option<&Position>, b: Option<&Position>) -> bool {
	compare(a, b) == Ordering::Greater
}

/// `a` comes at or before `b`.
pub fn is_at_or_before(a: Option<&Position>, b: Option<&Position>) -> bool {
	compare(a, b) != Ordering::Greater
}
