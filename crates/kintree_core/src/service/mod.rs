//! Core use-case services.
//!
//! # Responsibility
//! - Turn store primitives into intent-level operations.
//! - Keep view and FFI layers decoupled from storage details.

pub mod error;
pub mod relationship_service;
pub mod session;
pub mod snapshot_service;
