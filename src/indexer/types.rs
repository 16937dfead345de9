//! Wire types for the Sui event query API.

use serde::{Deserialize, Serialize};

/// Identifier of a single ledger event: the emitting transaction digest plus the event's
/// sequence number. Also used as the remote pagination cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId {
    /// Digest of the transaction that emitted the event.
    #[serde(rename = "txDigest")]
    pub tx_digest: String,
    /// Sequence number of the event.
    #[serde(rename = "eventSeq", with = "decimal_u64")]
    pub event_seq: u64,
}

impl EventId {
    pub fn new(tx_digest: impl Into<String>, event_seq: u64) -> Self {
        Self {
            tx_digest: tx_digest.into(),
            event_seq,
        }
    }
}

/// An event as returned by `suix_queryEvents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub id: EventId,
    /// Package that emitted the event.
    #[serde(rename = "packageId")]
    pub package_id: String,
    /// Module of the entry function of the emitting transaction.
    #[serde(rename = "transactionModule")]
    pub transaction_module: String,
    /// Fully qualified Move type, e.g. `0xabc::vault::VaultCreated`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "timestampMs", with = "decimal_u64", default)]
    pub timestamp_ms: u64,
    /// Decoded Move struct, if the node could decode it.
    #[serde(rename = "parsedJson", default)]
    pub parsed_json: Option<serde_json::Value>,
}

/// One page of query results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPage {
    pub data: Vec<LedgerEvent>,
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<EventId>,
    #[serde(rename = "hasNextPage")]
    pub has_next_page: bool,
}


/// Event filter understood by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventFilter {
    /// Events emitted from transactions calling into the given module.
    MoveModule { package: String, module: String },
}

impl EventFilter {
    pub fn move_module(package: impl Into<String>, module: impl Into<String>) -> Self {
        EventFilter::MoveModule {
            package: package.into(),
            module: module.into(),
        }
    }
}

/// Remote-native ordering of query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn is_descending(self) -> bool {
        matches!(self, SortOrder::Descending)
    }
}

/// A single event query: filter, pagination cursor, page size and order.
#[derive(Debug, Clone)]
pub struct EventQuery {
    pub filter: EventFilter,
    /// `None` starts from the beginning (or the end, when descending).
    pub cursor: Option<EventId>,
    pub limit: u32,
    pub order: SortOrder,
}

impl EventQuery {
    /// Query for the most recent event only.
    pub fn head(filter: EventFilter) -> Self {
        Self {
            filter,
            cursor: None,
            limit: 1,
            order: SortOrder::Descending,
        }
    }

    /// Ascending page starting at `cursor`.
    pub fn ascending(filter: EventFilter, cursor: Option<EventId>, limit: u32) -> Self {
        Self {
            filter,
            cursor,
            limit,
            order: SortOrder::Ascending,
        }
    }
}

/// Error types for ledger event queries
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(reqwest::StatusCode),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IndexerError {
    /// Whether retrying the same query may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            IndexerError::Http(_) => true,
            IndexerError::Status(status) => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            // -32603 is the JSON-RPC internal error, typically an overloaded node.
            IndexerError::Rpc { code, .. } => *code == -32603,
            IndexerError::Malformed(_) | IndexerError::Json(_) => false,
        }
    }
}

/// Move integers wider than 53 bits are rendered as decimal strings; smaller ones may be bare
/// numbers. Accept both, always emit strings.
pub(crate) mod decimal_u64 {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Number(u64),
    }

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => text.trim().parse().map_err(D::Error::custom),
            Repr::Number(number) => Ok(number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_query_events_page() {
        let raw = json!({
            "data": [{
                "id": { "txDigest": "8uTq", "eventSeq": "3" },
                "packageId": "0xabc",
                "transactionModule": "vault",
                "sender": "0x1",
                "type": "0xabc::vault::CoinDeposited",
                "parsedJson": { "vault_id": "0x9", "amount": "100" },
                "bcs": "AAA",
                "timestampMs": "1700000000000"
            }],
            "nextCursor": { "txDigest": "8uTq", "eventSeq": "3" },
            "hasNextPage": false
        });

        let page: EventPage = serde_json::from_value(raw).unwrap();
        assert_eq!(page.data.len(), 1);
        let event = &page.data[0];
        assert_eq!(event.id, EventId::new("8uTq", 3));
        assert_eq!(event.timestamp_ms, 1_700_000_000_000);
        assert_eq!(event.event_type, "0xabc::vault::CoinDeposited");
        assert_eq!(page.next_cursor, Some(EventId::new("8uTq", 3)));
        assert!(!page.has_next_page);
    }

    #[test]
    fn event_seq_accepts_bare_numbers_and_serializes_as_string() {
        let id: EventId = serde_json::from_value(json!({ "txDigest": "d", "eventSeq": 7 })).unwrap();
        assert_eq!(id.event_seq, 7);
        assert_eq!(
            serde_json::to_value(&id).unwrap(),
            json!({ "txDigest": "d", "eventSeq": "7" })
        );
    }

    #[test]
    fn rejects_non_numeric_event_seq() {
        let result = serde_json::from_value::<EventId>(json!({ "txDigest": "d", "eventSeq": "x" }));
        assert!(result.is_err());
    }

    #[test]
    fn move_module_filter_serializes_externally_tagged() {
        let filter = EventFilter::move_module("0xabc", "vault");
        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({ "MoveModule": { "package": "0xabc", "module": "vault" } })
        );
    }

    #[test]
    fn transient_classification() {
        assert!(IndexerError::Status(reqwest::StatusCode::BAD_GATEWAY).is_transient());
        assert!(IndexerError::Status(reqwest::StatusCode::TOO_MANY_REQUESTS).is_transient());
        assert!(!IndexerError::Status(reqwest::StatusCode::BAD_REQUEST).is_transient());
        assert!(!IndexerError::Malformed("no result".into()).is_transient());
        assert!(
            IndexerError::Rpc {
                code: -32603,
                message: "busy".into()
            }
            .is_transient()
        );
    }
}
