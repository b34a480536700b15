//! Snapshot persistence adapter.
//!
//! # Responsibility
//! - Serialize the full tree state into one blob and restore it on startup.
//! - Accept the bare-array blob the charting engine writes itself, dropping
//!   `data` keys that are not person fields.
//!
//! # Invariants
//! - Restore failures are logged and reported as `None`, never as errors.
//! - A failed persist never touches in-memory state.
//! - The blob under `SNAPSHOT_BLOB_KEY` is always a complete snapshot.

use crate::logging::sanitize_for_log;
use crate::model::person::{
    Attributes, PartnerLink, Person, PersonField, PersonId, Relationships,
};
use crate::model::snapshot::TreeSnapshot;
use crate::repo::blob_repo::{BlobStore, BlobStoreError};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Well-known key of the persisted snapshot.
pub const SNAPSHOT_BLOB_KEY: &str = "familyTreeData";
/// Envelope format version written by `persist`.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotEnvelopeRef<'a> {
    version: u32,
    persons: &'a TreeSnapshot,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredSnapshot {
    Envelope { version: u32, persons: TreeSnapshot },
    Legacy(Vec<LegacyPerson>),
}

/// Bare-array record as written by the charting engine itself.
///
/// Looser than `Person`: spouses may be plain ids, `data` may carry keys
/// and non-string values that are not person fields.
#[derive(Deserialize)]
struct LegacyPerson {
    id: PersonId,
    #[serde(default)]
    data: BTreeMap<String, Value>,
    #[serde(default)]
    rels: LegacyRelationships,
}

#[derive(Default, Deserialize)]
struct LegacyRelationships {
    #[serde(default)]
    parents: BTreeSet<PersonId>,
    #[serde(default)]
    children: BTreeSet<PersonId>,
    #[serde(default)]
    spouses: Vec<LegacySpouse>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LegacySpouse {
    Id(PersonId),
    Link(PartnerLink),
}

impl LegacyPerson {
    /// Converts to a canonical record, collecting the `data` keys it drops.
    fn into_person(self, dropped: &mut BTreeSet<String>) -> Person {
        let attributes = self
            .data
            .into_iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    Value::String(text) => Some(text),
                    Value::Number(number) => Some(number.to_string()),
                    Value::Bool(flag) => Some(flag.to_string()),
                    Value::Null | Value::Array(_) | Value::Object(_) => None,
                };
                match (PersonField::parse(key.as_str()), text) {
                    (Some(field), Some(text)) => Some((field, text)),
                    _ => {
                        dropped.insert(key);
                        None
                    }
                }
            })
            .collect::<Attributes>();

        let partners = self
            .rels
            .spouses
            .into_iter()
            .map(|spouse| match spouse {
                LegacySpouse::Id(id) => PartnerLink {
                    id,
                    marriage_date: None,
                },
                LegacySpouse::Link(link) => link,
            })
            .collect();

        let mut person = Person::new(self.id, attributes);
        person.relationships = Relationships {
            parents: self.rels.parents,
            children: self.rels.children,
            partners,
        };
        person
    }
}

fn from_legacy(records: Vec<LegacyPerson>) -> TreeSnapshot {
    let mut dropped = BTreeSet::new();
    let persons = records
        .into_iter()
        .map(|record| record.into_person(&mut dropped))
        .collect::<Vec<_>>();
    if !dropped.is_empty() {
        let keys = dropped.into_iter().collect::<Vec<_>>().join(",");
        warn!(
            "event=snapshot_decode module=persistence status=fallback format=legacy reason=unknown_fields keys={}",
            sanitize_for_log(&keys)
        );
    }
    TreeSnapshot::new(persons)
}

/// Write-side failures.
#[derive(Debug)]
pub enum PersistenceError {
    Encode(serde_json::Error),
    Write(BlobStoreError),
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(err) => write!(f, "failed to encode snapshot: {err}"),
            Self::Write(err) => write!(f, "failed to write snapshot: {err}"),
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Encode(err) => Some(err),
            Self::Write(err) => Some(err),
        }
    }
}

/// Read-side failures. `restore` folds these into `None`.
#[derive(Debug)]
pub enum RestoreError {
    Read(BlobStoreError),
    Parse(serde_json::Error),
    UnsupportedVersion { found: u32, supported: u32 },
}

impl Display for RestoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(err) => write!(f, "failed to read snapshot: {err}"),
            Self::Parse(err) => write!(f, "failed to parse snapshot: {err}"),
            Self::UnsupportedVersion { found, supported } => write!(
                f,
                "snapshot format version {found} is newer than supported {supported}"
            ),
        }
    }
}

impl Error for RestoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::UnsupportedVersion { .. } => None,
        }
    }
}

/// Adapter between tree snapshots and a blob store.
pub struct SnapshotService<B: BlobStore> {
    blobs: B,
}

impl<B: BlobStore> SnapshotService<B> {
    pub fn new(blobs: B) -> Self {
        Self { blobs }
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    pub fn blobs_mut(&mut self) -> &mut B {
        &mut self.blobs
    }

    /// Reads the saved snapshot as a candidate dataset.
    ///
    /// Returns `None` when nothing is saved or the blob is unreadable; the
    /// caller then falls back to the bundled default.
    pub fn restore(&self) -> Option<TreeSnapshot> {
        match self.try_restore() {
            Ok(Some(snapshot)) => {
                info!(
                    "event=snapshot_restore module=persistence status=ok persons={}",
                    snapshot.len()
                );
                Some(snapshot)
            }
            Ok(None) => {
                info!("event=snapshot_restore module=persistence status=empty");
                None
            }
            Err(err) => {
                warn!(
                    "event=snapshot_restore module=persistence status=error error={}",
                    err
                );
                None
            }
        }
    }

    /// Reads the saved snapshot, exposing the failure reason.
    pub fn try_restore(&self) -> Result<Option<TreeSnapshot>, RestoreError> {
        let Some(raw) = self
            .blobs
            .get(SNAPSHOT_BLOB_KEY)
            .map_err(RestoreError::Read)?
        else {
            return Ok(None);
        };
        decode_snapshot(raw.as_str()).map(Some)
    }

    /// Serializes and writes `snapshot`, replacing any previous value.
    pub fn persist(&mut self, snapshot: &TreeSnapshot) -> Result<(), PersistenceError> {
        let encoded = encode_snapshot(snapshot)?;
        self.blobs
            .put(SNAPSHOT_BLOB_KEY, encoded.as_str())
            .map_err(|err| {
                warn!(
                    "event=snapshot_persist module=persistence status=error bytes={} error={}",
                    encoded.len(),
                    err
                );
                PersistenceError::Write(err)
            })?;
        info!(
            "event=snapshot_persist module=persistence status=ok persons={} bytes={}",
            snapshot.len(),
            encoded.len()
        );
        Ok(())
    }

    /// Removes the saved snapshot.
    pub fn clear(&mut self) -> Result<(), PersistenceError> {
        self.blobs
            .remove(SNAPSHOT_BLOB_KEY)
            .map_err(PersistenceError::Write)?;
        info!("event=snapshot_clear module=persistence status=ok");
        Ok(())
    }
}

/// Encodes a snapshot in the current envelope format.
pub fn encode_snapshot(snapshot: &TreeSnapshot) -> Result<String, PersistenceError> {
    serde_json::to_string(&SnapshotEnvelopeRef {
        version: SNAPSHOT_FORMAT_VERSION,
        persons: snapshot,
    })
    .map_err(PersistenceError::Encode)
}

/// Decodes an envelope or a legacy bare-array snapshot.
pub fn decode_snapshot(raw: &str) -> Result<TreeSnapshot, RestoreError> {
    match serde_json::from_str::<StoredSnapshot>(raw).map_err(RestoreError::Parse)? {
        StoredSnapshot::Envelope { version, persons } => {
            if version > SNAPSHOT_FORMAT_VERSION {
                return Err(RestoreError::UnsupportedVersion {
                    found: version,
                    supported: SNAPSHOT_FORMAT_VERSION,
                });
            }
            Ok(persons)
        }
        StoredSnapshot::Legacy(records) => Ok(from_legacy(records)),
    }
}
