//! Persisted asset catalog used as an idempotency gate.
//!
//! Assets that are expensive to fetch and keyed by a human name (brand logos)
//! are fetched once, stored under the assets directory, and recorded in a JSON
//! catalog. Later requests for the same normalized key reuse the stored file
//! and bump its usage counters.

mod entry;
mod gate;
mod key;
mod lock;
mod persist;

pub use entry::{Catalog, CatalogEntry, CatalogStats, FetchedAsset};
pub use gate::{CatalogGate, GateOutcome};
pub use key::{normalize_key, slug};
