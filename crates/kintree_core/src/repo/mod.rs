//! Record store and blob storage layer.
//!
//! # Responsibility
//! - Own the authoritative in-memory person records.
//! - Isolate blob storage details (SQLite, in-memory) from services.
//!
//! # Invariants
//! - Only services mutate the record store, through staged batches.
//! - Storage APIs return semantic errors (`QuotaExceeded`) in addition to
//!   DB transport errors.

pub mod blob_repo;
pub mod person_store;
