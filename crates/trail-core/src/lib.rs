//! # trail-core
//!
//! Core types, collaborator traits, and error types for the audit trail.
//!
//! This crate provides the foundational types shared by the store adapter and
//! the reconciliation engine:
//! - `TrailEntry`, the durable record of one reconciled mutation
//! - `WriteAction` and its SQL/serde representation
//! - The error taxonomy surfaced by the engine and the store
//! - Capability traits for identity extraction and ambient context lookups
//! - The `TrailStore` repository contract
//! - Transaction correlation id parsing

pub mod context;
pub mod correlation;
pub mod entities;
pub mod enums;
pub mod errors;
pub mod store;
