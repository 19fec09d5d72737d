//! Entity structs persisted by the trail store.
//!
//! All structs derive `Serialize`, `Deserialize`, and `JsonSchema` for JSON
//! roundtrip and schema validation.

mod trail_entry;

pub use trail_entry::TrailEntry;
