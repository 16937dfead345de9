//! Event store database schema.

/// SQL to create the event and cursor tables. Idempotent.
pub const CREATE_TABLES: &[&str] = &[
	r"
CREATE TABLE IF NOT EXISTS events (
    txn_digest   TEXT    NOT NULL,
    seq          INTEGER NOT NULL,
    package_id   TEXT    NOT NULL,
    txn_module   TEXT    NOT NULL,
    evt_type     TEXT    NOT NULL,
    timestamp_ms INTEGER NOT NULL,
    payload_json TEXT    NOT NULL,
    PRIMARY KEY (txn_digest, seq)
)",
	r"
CREATE INDEX IF NOT EXISTS idx_events_position
    ON events (seq, txn_digest)",
	r"
CREATE TABLE IF NOT EXISTS cursor (
    id             INTEGER PRIMARY KEY CHECK (id = 1),
    last_tx_digest TEXT    NOT NULL,
    last_seq       INTEGER NOT NULL
)",
];

/// Fixed primary key of the cursor singleton.
pub const CURSOR_ID: i64 = 1;
