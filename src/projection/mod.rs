//! Vault projection: the read model built from the stored event log.
//!
//! - `events`: typed vault events decoded from stored payloads.
//! - `aggregate`: vault state and the serialisable view handed to callers.
//! - `projector`: the deterministic fold from ordered rows to aggregates.
//! - `query`: list/get over the projection, cached by store cursor.

pub mod aggregate;
pub mod events;
pub mod projector;
pub mod query;

pub use aggregate::{RebalancePolicy, TokenView, VaultAggregate, VaultView};
pub use events::{DecodeError, EventKind, VaultEvent};
pub use projector::{Projection, ProjectionWarning, project};
pub use query::{QueryError, VaultFilter, VaultQueryService};
