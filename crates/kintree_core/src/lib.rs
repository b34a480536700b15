//! Core domain logic for KinTree.
//! This crate is the single source of truth for family tree invariants.

pub mod access;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;
pub mod view;

pub use access::gate::{
    parse_session_mode, OperationKind, PermissionDenied, PermissionGate, SessionMode,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::person::{
    AttributeChanges, Attributes, Gender, PartnerLink, Person, PersonDraft, PersonField,
    PersonId, RelationKind, Relationships, ValidationError,
};
pub use model::snapshot::TreeSnapshot;
pub use query::family::{find_by_name, immediate_family};
pub use repo::blob_repo::{BlobStore, BlobStoreError, MemoryBlobStore, SqliteBlobStore};
pub use repo::person_store::{PersonStore, StoreError};
pub use service::error::{ErrorKind, TreeError, TreeResult};
pub use service::relationship_service::RelationshipService;
pub use service::session::{SnapshotSource, TreeSession};
pub use service::snapshot_service::{SnapshotService, SNAPSHOT_BLOB_KEY};
pub use view::{CapturingView, Feedback, Intent, IntentOutcome, PersonCard, ViewBinding};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
