//! Tree editing session.
//!
//! # Responsibility
//! - Bootstrap the record store from the saved snapshot or the bundled default.
//! - Route intents through the permission gate, the relationship engine and
//!   the persistence adapter, then re-render the view.
//!
//! # Invariants
//! - Denied intents never reach the relationship engine.
//! - A mutation is rendered only after its snapshot was persisted.
//! - Intents are handled one at a time (`&mut self`), so at most one persist
//!   is in flight and writes never interleave.
//! - Every failed intent is logged and reported to the view.

use crate::access::gate::{OperationKind, PermissionGate, SessionMode};
use crate::logging::sanitize_for_log;
use crate::model::person::{AttributeChanges, Person, PersonDraft, PersonId, RelationKind};
use crate::model::snapshot::TreeSnapshot;
use crate::repo::blob_repo::BlobStore;
use crate::repo::person_store::PersonStore;
use crate::service::error::{TreeError, TreeResult};
use crate::service::relationship_service::RelationshipService;
use crate::service::snapshot_service::SnapshotService;
use crate::view::{Feedback, Intent, IntentOutcome, PersonCard, ViewBinding};
use log::{info, warn};

const RETRY_PERSIST_EVENT: &str = "retry_persist";

/// Where the current tree state was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    Restored,
    BundledDefault,
}

impl SnapshotSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Restored => "restored",
            Self::BundledDefault => "bundled_default",
        }
    }
}

/// One editing session over an owned store, blob store and view.
pub struct TreeSession<B: BlobStore, V: ViewBinding> {
    gate: PermissionGate,
    store: PersonStore,
    persistence: SnapshotService<B>,
    view: V,
    source: SnapshotSource,
    unsaved_changes: bool,
}

impl<B: BlobStore, V: ViewBinding> TreeSession<B, V> {
    /// Loads the tree and performs the initial render.
    ///
    /// A missing, corrupt or invalid saved snapshot falls back to the bundled
    /// default dataset; those failures are logged, never returned.
    pub fn start(mode: SessionMode, blobs: B, view: V) -> TreeResult<Self> {
        let persistence = SnapshotService::new(blobs);
        let mut store = PersonStore::new();

        let restored = persistence
            .restore()
            .and_then(|snapshot| match store.load(snapshot) {
                Ok(()) => Some(SnapshotSource::Restored),
                Err(err) => {
                    warn!(
                        "event=session_start module=session status=fallback reason=invalid_snapshot error={}",
                        sanitize_for_log(&err.to_string())
                    );
                    None
                }
            });
        let source = match restored {
            Some(source) => source,
            None => {
                store.load(TreeSnapshot::bundled_default())?;
                SnapshotSource::BundledDefault
            }
        };

        info!(
            "event=session_start module=session status=ok mode={} source={} persons={}",
            mode,
            source.as_str(),
            store.len()
        );

        let mut session = Self {
            gate: PermissionGate::new(mode),
            store,
            persistence,
            view,
            source,
            unsaved_changes: false,
        };
        session.rerender();
        Ok(session)
    }

    pub fn mode(&self) -> SessionMode {
        self.gate.mode()
    }

    pub fn source(&self) -> SnapshotSource {
        self.source
    }

    pub fn store(&self) -> &PersonStore {
        &self.store
    }

    /// Current full state, as handed to the view.
    pub fn snapshot(&self) -> TreeSnapshot {
        self.store.snapshot()
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn persistence(&self) -> &SnapshotService<B> {
        &self.persistence
    }

    /// Whether the last mutation failed to persist.
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved_changes
    }

    /// Handles one intent and reports failures to the view.
    pub fn dispatch(&mut self, intent: Intent) -> TreeResult<IntentOutcome> {
        let operation = intent.operation();
        let result = match intent {
            Intent::Open(person_id) => self.open(&person_id).map(IntentOutcome::Opened),
            Intent::SubmitEdit { person_id, changes } => self
                .submit_edit(&person_id, &changes)
                .map(IntentOutcome::Edited),
            Intent::AddRelative {
                anchor_id,
                draft,
                kind,
            } => self
                .add_relative(&anchor_id, &draft, kind)
                .map(IntentOutcome::RelativeAdded),
            Intent::RemoveRelative {
                anchor_id,
                relative_id,
            } => self
                .remove_relative(&anchor_id, &relative_id)
                .map(IntentOutcome::RelativeRemoved),
            Intent::RemovePerson(person_id) => self
                .remove_person(&person_id)
                .map(|person| IntentOutcome::PersonRemoved(person.id)),
            Intent::SetPartnership {
                person_id,
                partner_id,
                marriage_date,
            } => self
                .set_partnership(&person_id, &partner_id, marriage_date)
                .map(|()| IntentOutcome::PartnershipUpdated),
            Intent::Reset => self.reset().map(|()| IntentOutcome::Reset),
        };

        if let Err(err) = &result {
            warn!(
                "event=intent_rejected module=session status=error operation={} kind={} error={}",
                operation,
                err.kind().as_str(),
                sanitize_for_log(&err.to_string())
            );
            self.view.report(&Feedback::from_error(operation, err));
        }
        result
    }

    /// Opens one person's detail card. Permitted in every mode.
    pub fn open(&mut self, person_id: &PersonId) -> TreeResult<PersonCard> {
        self.gate.authorize(OperationKind::Open)?;
        let person = self.store.get_person(person_id)?.clone();
        let card = PersonCard::new(person, self.gate.is_read_only());
        self.view.show_person(&card);
        Ok(card)
    }

    pub fn submit_edit(
        &mut self,
        person_id: &PersonId,
        changes: &AttributeChanges,
    ) -> TreeResult<Person> {
        self.gate.authorize(OperationKind::EditAttributes)?;
        let person = self.engine().edit_attributes(person_id, changes)?;
        self.commit(OperationKind::EditAttributes.as_str())?;
        Ok(person)
    }

    pub fn add_relative(
        &mut self,
        anchor_id: &PersonId,
        draft: &PersonDraft,
        kind: RelationKind,
    ) -> TreeResult<PersonId> {
        self.gate.authorize(OperationKind::AddRelative)?;
        let relative_id = self.engine().add_relative(anchor_id, draft, kind)?;
        self.commit(OperationKind::AddRelative.as_str())?;
        Ok(relative_id)
    }

    pub fn remove_relative(
        &mut self,
        anchor_id: &PersonId,
        relative_id: &PersonId,
    ) -> TreeResult<RelationKind> {
        self.gate.authorize(OperationKind::RemoveRelative)?;
        let kind = self.engine().remove_relative(anchor_id, relative_id)?;
        self.commit(OperationKind::RemoveRelative.as_str())?;
        Ok(kind)
    }

    pub fn remove_person(&mut self, person_id: &PersonId) -> TreeResult<Person> {
        self.gate.authorize(OperationKind::RemovePerson)?;
        let person = self.engine().remove_person(person_id)?;
        self.commit(OperationKind::RemovePerson.as_str())?;
        Ok(person)
    }

    pub fn set_partnership(
        &mut self,
        person_id: &PersonId,
        partner_id: &PersonId,
        marriage_date: Option<String>,
    ) -> TreeResult<()> {
        self.gate.authorize(OperationKind::SetPartnership)?;
        self.engine()
            .set_partnership(person_id, partner_id, marriage_date)?;
        self.commit(OperationKind::SetPartnership.as_str())
    }

    /// Debug/recovery hook: clears the saved snapshot and reloads the default.
    pub fn reset(&mut self) -> TreeResult<()> {
        self.gate.authorize(OperationKind::ResetData)?;
        self.persistence.clear()?;
        self.store.load(TreeSnapshot::bundled_default())?;
        self.source = SnapshotSource::BundledDefault;
        self.unsaved_changes = false;
        info!("event=session_reset module=session status=ok");
        self.rerender();
        Ok(())
    }

    /// Persists the current state again after a failed write.
    ///
    /// No-op when nothing is pending; only a committed mutation, which the
    /// gate already authorized, can leave unsaved changes behind.
    pub fn retry_persist(&mut self) -> TreeResult<()> {
        if !self.unsaved_changes {
            return Ok(());
        }
        self.commit(RETRY_PERSIST_EVENT)
    }

    fn engine(&mut self) -> RelationshipService<'_> {
        RelationshipService::new(&mut self.store)
    }

    /// Writes the new canonical snapshot, then re-renders from it.
    fn commit(&mut self, operation: &str) -> TreeResult<()> {
        let snapshot = self.store.snapshot();
        if let Err(err) = self.persistence.persist(&snapshot) {
            self.unsaved_changes = true;
            return Err(TreeError::Persistence(err));
        }
        self.unsaved_changes = false;
        info!(
            "event=tree_commit module=session status=ok operation={} persons={}",
            operation,
            snapshot.len()
        );
        self.view.render(&snapshot);
        Ok(())
    }

    fn rerender(&mut self) {
        let snapshot = self.store.snapshot();
        self.view.render(&snapshot);
    }
}
