//! Read-side repository modules.
//!
//! Each module adds query methods to `TrailDb` via `impl TrailDb` blocks.

pub mod trail;
