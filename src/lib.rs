//! Vault event indexer.
//!
//! Replicates the event stream of the on-chain vault module into a local event store and folds
//! the stored log into queryable vault aggregates.
//!
//! - `indexer`: the remote ledger event source (Sui JSON-RPC).
//! - `store`: durable event rows plus the singleton ingestion cursor.
//! - `sync`: position ordering, catch-up replay, live polling and the persistence gateway.
//! - `projection`: typed vault events, the aggregate fold and the read-side query service.

pub mod config;
pub mod indexer;
pub mod projection;
pub mod store;
pub mod sync;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;
