//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, intent-level tree functions to Dart via FRB.
//! - Flatten core errors into simple response envelopes.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - One live session per process, behind a mutex: intents from any thread
//!   are serialized, so at most one persist is in flight.
//! - The live session outlives a failed persist; its store stays the latest
//!   valid state until `tree_retry_persist` writes it.
//! - Session mode is fixed once per process by `configure_session`.

use kintree_core::{
    core_version as core_version_inner, default_log_level,
    init_logging as init_logging_inner, parse_session_mode, ping as ping_inner,
    AttributeChanges, BlobStore, CapturingView, Intent, IntentOutcome, PersonDraft,
    PersonField, PersonId, RelationKind, SessionMode, SqliteBlobStore, TreeError, TreeSession,
};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock, PoisonError};

const TREE_DB_FILE_NAME: &str = "kintree.sqlite3";
const TREE_DB_PATH_ENV: &str = "KINTREE_DB_PATH";
static SESSION_CONFIG: OnceLock<SessionConfig> = OnceLock::new();
static TREE_SESSION: Mutex<SessionSlot> = Mutex::new(SessionSlot { active: None });

type FfiSession = TreeSession<Box<dyn BlobStore + Send>, CapturingView>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionConfig {
    mode: SessionMode,
    db_path: PathBuf,
}

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: `trace|debug|info|warn|error`; blank selects the build default
///   (`debug` in debug builds, `info` in release).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(effective_log_level(level.as_str()), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Fixes the session mode and database path, then loads the tree.
///
/// Input semantics:
/// - `mode`: `admin` or `restricted-viewer` (aliases `viewer`, `user`).
/// - `db_path`: SQLite file; `None` falls back to `KINTREE_DB_PATH`, then a
///   temp-dir file.
///
/// # FFI contract
/// - Repeating the same configuration is a no-op.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn configure_session(mode: String, db_path: Option<String>) -> String {
    let mode = match parse_session_mode(mode.as_str()) {
        Ok(mode) => mode,
        Err(err) => return err.to_string(),
    };
    let config = SessionConfig {
        mode,
        db_path: db_path
            .as_deref()
            .and_then(non_blank_path)
            .unwrap_or_else(default_db_path),
    };

    let active = SESSION_CONFIG.get_or_init(|| config.clone());
    if *active != config {
        return format!(
            "session already configured as `{}` at `{}`",
            active.mode,
            active.db_path.display()
        );
    }

    with_slot(|slot| match slot.session(&config) {
        Ok(_) => String::new(),
        Err(response) => response.message,
    })
}

/// One field of a person form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonFieldInput {
    /// Wire field name, for example `first name` or `mobile_no`.
    pub field: String,
    /// New value; `None` or blank clears the field.
    pub value: Option<String>,
}

/// Response envelope for tree intents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeActionResponse {
    /// Whether the intent succeeded.
    pub ok: bool,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
    /// `validation|not_found|permission_denied|persistence` on failure.
    pub error_kind: Option<String>,
    /// Person created or affected by the intent, when there is one.
    pub person_id: Option<String>,
    /// The in-memory tree is ahead of the saved blob; offer a retry.
    pub unsaved_changes: bool,
    /// Full tree from the live store as a JSON array.
    pub snapshot_json: String,
}

impl TreeActionResponse {
    fn failure(message: impl Into<String>, error_kind: Option<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            error_kind,
            person_id: None,
            unsaved_changes: false,
            snapshot_json: String::new(),
        }
    }
}

/// Detail form envelope for `tree_open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonCardResponse {
    pub ok: bool,
    pub message: String,
    pub error_kind: Option<String>,
    /// Fields are shown read-only and relative actions are hidden.
    pub read_only: bool,
    /// Form title for the current mode.
    pub title: String,
    /// The person record as JSON.
    pub person_json: Option<String>,
}

impl PersonCardResponse {
    fn failure(message: impl Into<String>, error_kind: Option<String>, read_only: bool) -> Self {
        Self {
            ok: false,
            message: message.into(),
            error_kind,
            read_only,
            title: String::new(),
            person_json: None,
        }
    }
}

/// Returns the current tree without dispatching an intent.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_snapshot() -> TreeActionResponse {
    let config = resolve_session_config();
    with_slot(|slot| slot.snapshot(&config))
}

/// Opens the detail form of one person. Allowed in every mode.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_open(person_id: String) -> PersonCardResponse {
    let config = resolve_session_config();
    with_slot(|slot| slot.open(&config, PersonId::new(person_id.trim())))
}

/// Applies a form submission to an existing person.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_submit_edit(person_id: String, fields: Vec<PersonFieldInput>) -> TreeActionResponse {
    let changes = match to_attribute_changes(&fields) {
        Ok(changes) => changes,
        Err(message) => return validation_failure("tree_submit_edit", message),
    };
    dispatch_intent(
        "tree_submit_edit",
        Intent::SubmitEdit {
            person_id: PersonId::new(person_id.trim()),
            changes,
        },
    )
}

/// Creates a new person linked to `anchor_id`.
///
/// `kind` is the role of the new person: `parent`, `child` or `spouse`.
/// `other_parent_id` is only valid for a child and must be the anchor's partner.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_add_relative(
    anchor_id: String,
    kind: String,
    fields: Vec<PersonFieldInput>,
    marriage_date: Option<String>,
    other_parent_id: Option<String>,
) -> TreeActionResponse {
    let Some(kind) = RelationKind::parse(kind.as_str()) else {
        return validation_failure(
            "tree_add_relative",
            format!("unsupported relation kind `{}`", kind.trim()),
        );
    };
    let changes = match to_attribute_changes(&fields) {
        Ok(changes) => changes,
        Err(message) => return validation_failure("tree_add_relative", message),
    };

    let mut draft = PersonDraft::new(changes);
    if let Some(date) = marriage_date.filter(|date| !date.trim().is_empty()) {
        draft = draft.with_marriage_date(date.trim());
    }
    if let Some(other) = other_parent_id.filter(|other| !other.trim().is_empty()) {
        draft = draft.with_other_parent(PersonId::new(other.trim()));
    }

    dispatch_intent(
        "tree_add_relative",
        Intent::AddRelative {
            anchor_id: PersonId::new(anchor_id.trim()),
            draft,
            kind,
        },
    )
}

/// Removes the relationship between two persons, on both sides.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_remove_relative(anchor_id: String, relative_id: String) -> TreeActionResponse {
    dispatch_intent(
        "tree_remove_relative",
        Intent::RemoveRelative {
            anchor_id: PersonId::new(anchor_id.trim()),
            relative_id: PersonId::new(relative_id.trim()),
        },
    )
}

/// Removes a person and every edge that references it.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_remove_person(person_id: String) -> TreeActionResponse {
    dispatch_intent(
        "tree_remove_person",
        Intent::RemovePerson(PersonId::new(person_id.trim())),
    )
}

/// Sets or clears the marriage date on an existing partner edge.
///
/// Both persons must already be partners; a blank date clears it.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_set_partnership(
    person_id: String,
    partner_id: String,
    marriage_date: Option<String>,
) -> TreeActionResponse {
    dispatch_intent(
        "tree_set_partnership",
        Intent::SetPartnership {
            person_id: PersonId::new(person_id.trim()),
            partner_id: PersonId::new(partner_id.trim()),
            marriage_date,
        },
    )
}

/// Drops the saved snapshot and reloads the bundled default. Admin only.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_reset() -> TreeActionResponse {
    dispatch_intent("tree_reset", Intent::Reset)
}

/// Writes the live tree again after a `persistence` failure.
///
/// Succeeds without writing when nothing is pending.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_retry_persist() -> TreeActionResponse {
    let config = resolve_session_config();
    with_slot(|slot| slot.retry_persist(&config))
}

fn dispatch_intent(label: &str, intent: Intent) -> TreeActionResponse {
    let config = resolve_session_config();
    with_slot(|slot| slot.dispatch(&config, label, intent))
}

fn with_slot<T>(f: impl FnOnce(&mut SessionSlot) -> T) -> T {
    let mut slot = TREE_SESSION.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut slot)
}

struct ActiveSession {
    config: SessionConfig,
    session: FfiSession,
}

/// Holder of the live session, started lazily from the saved blob.
struct SessionSlot {
    active: Option<ActiveSession>,
}

impl SessionSlot {
    /// Returns the live session for `config`, starting it when missing or
    /// when the configuration changed.
    fn session(&mut self, config: &SessionConfig) -> Result<&mut FfiSession, TreeActionResponse> {
        let stale = self
            .active
            .as_ref()
            .map_or(true, |active| active.config != *config);
        if stale {
            if self
                .active
                .as_ref()
                .is_some_and(|active| active.session.has_unsaved_changes())
            {
                warn!("event=ffi_session_replace module=ffi status=fallback reason=unsaved_changes_dropped");
            }
            let session = start_session(config)?;
            info!(
                "event=ffi_session_start module=ffi status=ok mode={}",
                config.mode
            );
            self.active = Some(ActiveSession {
                config: config.clone(),
                session,
            });
        }

        self.active
            .as_mut()
            .map(|active| &mut active.session)
            .ok_or_else(|| TreeActionResponse::failure("tree session is not available", None))
    }

    fn snapshot(&mut self, config: &SessionConfig) -> TreeActionResponse {
        match self.session(config) {
            Ok(session) => TreeActionResponse {
                ok: true,
                message: format!("Loaded {} person(s).", session.store().len()),
                error_kind: None,
                person_id: None,
                unsaved_changes: session.has_unsaved_changes(),
                snapshot_json: snapshot_json(session),
            },
            Err(response) => response,
        }
    }

    fn open(&mut self, config: &SessionConfig, person_id: PersonId) -> PersonCardResponse {
        let session = match self.session(config) {
            Ok(session) => session,
            Err(response) => {
                return PersonCardResponse::failure(response.message, response.error_kind, true)
            }
        };
        let read_only = session.mode() == SessionMode::RestrictedViewer;
        match session.dispatch(Intent::Open(person_id)) {
            Ok(IntentOutcome::Opened(card)) => PersonCardResponse {
                ok: true,
                message: card.person.display_name(),
                error_kind: None,
                read_only: card.read_only,
                title: card.title.to_string(),
                person_json: serde_json::to_string(&card.person).ok(),
            },
            Ok(_) => PersonCardResponse::failure(
                "tree_open failed: unexpected outcome",
                None,
                read_only,
            ),
            Err(err) => PersonCardResponse::failure(
                format!("tree_open failed: {err}"),
                Some(err.kind().as_str().to_string()),
                read_only,
            ),
        }
    }

    fn dispatch(&mut self, config: &SessionConfig, label: &str, intent: Intent) -> TreeActionResponse {
        let session = match self.session(config) {
            Ok(session) => session,
            Err(response) => return response,
        };
        let result = session.dispatch(intent);
        session_response(session, label, result.map(|outcome| {
            (outcome_message(&outcome), outcome_person_id(&outcome))
        }))
    }

    fn retry_persist(&mut self, config: &SessionConfig) -> TreeActionResponse {
        let session = match self.session(config) {
            Ok(session) => session,
            Err(response) => return response,
        };
        let result = session
            .retry_persist()
            .map(|()| ("Tree saved.".to_string(), None));
        session_response(session, "tree_retry_persist", result)
    }
}

fn session_response(
    session: &FfiSession,
    label: &str,
    result: Result<(String, Option<String>), TreeError>,
) -> TreeActionResponse {
    match result {
        Ok((message, person_id)) => TreeActionResponse {
            ok: true,
            message,
            error_kind: None,
            person_id,
            unsaved_changes: session.has_unsaved_changes(),
            snapshot_json: snapshot_json(session),
        },
        Err(err) => TreeActionResponse {
            ok: false,
            message: format!("{label} failed: {err}"),
            error_kind: Some(err.kind().as_str().to_string()),
            person_id: None,
            unsaved_changes: session.has_unsaved_changes(),
            snapshot_json: snapshot_json(session),
        },
    }
}

fn start_session(config: &SessionConfig) -> Result<FfiSession, TreeActionResponse> {
    let blobs = SqliteBlobStore::open(&config.db_path).map_err(|err| {
        warn!(
            "event=ffi_session_open module=ffi status=error error={}",
            err
        );
        TreeActionResponse::failure(format!("tree DB open failed: {err}"), None)
    })?;
    let blobs: Box<dyn BlobStore + Send> = Box::new(blobs);
    TreeSession::start(config.mode, blobs, CapturingView::new()).map_err(|err: TreeError| {
        TreeActionResponse::failure(
            format!("tree session start failed: {err}"),
            Some(err.kind().as_str().to_string()),
        )
    })
}

/// Encodes the live store, which is ahead of the blob after a failed persist.
fn snapshot_json(session: &FfiSession) -> String {
    session.snapshot().to_json().unwrap_or_else(|err| {
        warn!(
            "event=ffi_snapshot_encode module=ffi status=error error={}",
            err
        );
        "[]".to_string()
    })
}

fn to_attribute_changes(fields: &[PersonFieldInput]) -> Result<AttributeChanges, String> {
    fields
        .iter()
        .try_fold(AttributeChanges::new(), |changes, input| {
            let field = PersonField::parse(input.field.as_str())
                .ok_or_else(|| format!("unknown person field `{}`", input.field.trim()))?;
            Ok(match input.value.as_deref() {
                Some(value) => changes.set(field, value),
                None => changes.clear(field),
            })
        })
}

fn validation_failure(label: &str, message: impl Into<String>) -> TreeActionResponse {
    TreeActionResponse::failure(
        format!("{label} failed: {}", message.into()),
        Some("validation".to_string()),
    )
}

fn outcome_message(outcome: &IntentOutcome) -> String {
    match outcome {
        IntentOutcome::Opened(card) => card.person.display_name(),
        IntentOutcome::Edited(_) => "Person updated.".to_string(),
        IntentOutcome::RelativeAdded(_) => "Relative added.".to_string(),
        IntentOutcome::RelativeRemoved(kind) => format!("Removed {kind} relationship."),
        IntentOutcome::PersonRemoved(_) => "Person removed.".to_string(),
        IntentOutcome::PartnershipUpdated => "Partnership updated.".to_string(),
        IntentOutcome::Reset => "Tree reset to default.".to_string(),
    }
}

fn outcome_person_id(outcome: &IntentOutcome) -> Option<String> {
    match outcome {
        IntentOutcome::Opened(card) => Some(card.person.id.to_string()),
        IntentOutcome::Edited(person) => Some(person.id.to_string()),
        IntentOutcome::RelativeAdded(id) | IntentOutcome::PersonRemoved(id) => {
            Some(id.to_string())
        }
        IntentOutcome::RelativeRemoved(_)
        | IntentOutcome::PartnershipUpdated
        | IntentOutcome::Reset => None,
    }
}

fn effective_log_level(level: &str) -> &str {
    if level.trim().is_empty() {
        default_log_level()
    } else {
        level
    }
}

/// Mode and path used when `configure_session` was never called.
///
/// Unconfigured processes get the least-privileged mode.
fn resolve_session_config() -> SessionConfig {
    SESSION_CONFIG
        .get()
        .cloned()
        .unwrap_or_else(|| SessionConfig {
            mode: SessionMode::RestrictedViewer,
            db_path: default_db_path(),
        })
}

fn default_db_path() -> PathBuf {
    std::env::var(TREE_DB_PATH_ENV)
        .ok()
        .as_deref()
        .and_then(non_blank_path)
        .unwrap_or_else(|| std::env::temp_dir().join(TREE_DB_FILE_NAME))
}

fn non_blank_path(raw: &str) -> Option<PathBuf> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        configure_session, core_version, effective_log_level, init_logging, ping,
        to_attribute_changes, ActiveSession, FfiSession, PersonFieldInput, SessionConfig,
        SessionSlot,
    };
    use kintree_core::{
        default_log_level, AttributeChanges, BlobStore, BlobStoreError, CapturingView, Intent,
        MemoryBlobStore, PersonDraft, PersonField, PersonId, RelationKind, SessionMode,
        TreeSession, SNAPSHOT_BLOB_KEY,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Memory store whose writes can be switched off from the test.
    struct SwitchableBlobStore {
        inner: MemoryBlobStore,
        reject_writes: Arc<AtomicBool>,
    }

    impl BlobStore for SwitchableBlobStore {
        fn get(&self, key: &str) -> Result<Option<String>, BlobStoreError> {
            self.inner.get(key)
        }

        fn put(&mut self, key: &str, value: &str) -> Result<(), BlobStoreError> {
            if self.reject_writes.load(Ordering::SeqCst) {
                return Err(BlobStoreError::QuotaExceeded {
                    key: key.to_string(),
                    size: value.len(),
                    quota: 0,
                });
            }
            self.inner.put(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<(), BlobStoreError> {
            self.inner.remove(key)
        }
    }

    fn config(mode: SessionMode) -> (TempDir, SessionConfig) {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("tree.sqlite3");
        (dir, SessionConfig { mode, db_path })
    }

    fn snapshot_value(json: &str) -> serde_json::Value {
        serde_json::from_str(json).expect("snapshot json")
    }

    fn first_name_of(json: &str, id: &str) -> Option<String> {
        snapshot_value(json)
            .as_array()
            .expect("array snapshot")
            .iter()
            .find(|person| person["id"] == id)
            .and_then(|person| person["data"]["first name"].as_str().map(str::to_string))
    }

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn blank_log_level_uses_build_default() {
        assert_eq!(effective_log_level("  "), default_log_level());
        assert_eq!(effective_log_level("warn"), "warn");
    }

    #[test]
    fn configure_session_rejects_unknown_mode() {
        let error = configure_session("superuser".to_string(), None);
        assert!(error.contains("superuser"));
    }

    #[test]
    fn to_attribute_changes_rejects_unknown_field() {
        let error = to_attribute_changes(&[PersonFieldInput {
            field: "shoe size".to_string(),
            value: Some("44".to_string()),
        }])
        .expect_err("unknown field must fail");
        assert!(error.contains("shoe size"));
    }

    #[test]
    fn admin_edit_is_visible_after_reload() {
        let (_dir, config) = config(SessionMode::Admin);
        let mut slot = SessionSlot { active: None };
        let response = slot.dispatch(
            &config,
            "tree_submit_edit",
            Intent::SubmitEdit {
                person_id: PersonId::new("10"),
                changes: AttributeChanges::new().set(PersonField::Profession, "Architect"),
            },
        );
        assert!(response.ok, "{}", response.message);
        assert!(!response.unsaved_changes);
        assert_eq!(response.person_id.as_deref(), Some("10"));

        let mut reloaded = SessionSlot { active: None };
        let session = reloaded
            .session(&config)
            .unwrap_or_else(|resp| panic!("{}", resp.message));
        let person = session
            .store()
            .get_person(&PersonId::new("10"))
            .expect("person 10");
        assert_eq!(
            person.attributes.get(PersonField::Profession),
            Some("Architect")
        );
    }

    #[test]
    fn viewer_mutation_is_denied_and_snapshot_is_unchanged() {
        let (_dir, config) = config(SessionMode::RestrictedViewer);
        let mut slot = SessionSlot { active: None };
        let before = slot.snapshot(&config);
        assert!(before.ok, "{}", before.message);

        let response = slot.dispatch(
            &config,
            "tree_add_relative",
            Intent::AddRelative {
                anchor_id: PersonId::new("10"),
                draft: PersonDraft::new(AttributeChanges::new().set(PersonField::FirstName, "X")),
                kind: RelationKind::Child,
            },
        );
        assert!(!response.ok);
        assert_eq!(response.error_kind.as_deref(), Some("permission_denied"));
        assert_eq!(
            snapshot_value(&response.snapshot_json),
            snapshot_value(&before.snapshot_json)
        );
    }

    #[test]
    fn added_relative_is_returned_in_snapshot_json() {
        let (_dir, config) = config(SessionMode::Admin);
        let mut slot = SessionSlot { active: None };
        let response = slot.dispatch(
            &config,
            "tree_add_relative",
            Intent::AddRelative {
                anchor_id: PersonId::new("11"),
                draft: PersonDraft::new(
                    AttributeChanges::new().set(PersonField::FirstName, "Vikram"),
                )
                .with_marriage_date("2020-02-02"),
                kind: RelationKind::Partner,
            },
        );
        assert!(response.ok, "{}", response.message);
        let new_id = response.person_id.expect("new person id");

        let persons = snapshot_value(&response.snapshot_json);
        let anchor = persons
            .as_array()
            .expect("array snapshot")
            .iter()
            .find(|person| person["id"] == "11")
            .expect("anchor present");
        assert_eq!(anchor["rels"]["spouses"][0]["id"], new_id.as_str());
        assert_eq!(anchor["rels"]["spouses"][0]["marriage_date"], "2020-02-02");
    }

    #[test]
    fn failed_persist_keeps_edit_in_live_session_until_retry() {
        let (_dir, config) = config(SessionMode::Admin);
        let reject_writes = Arc::new(AtomicBool::new(true));
        let blobs: Box<dyn BlobStore + Send> = Box::new(SwitchableBlobStore {
            inner: MemoryBlobStore::new(),
            reject_writes: Arc::clone(&reject_writes),
        });
        let session: FfiSession =
            TreeSession::start(SessionMode::Admin, blobs, CapturingView::new())
                .unwrap_or_else(|err| panic!("{err}"));
        let mut slot = SessionSlot {
            active: Some(ActiveSession {
                config: config.clone(),
                session,
            }),
        };

        let failed = slot.dispatch(
            &config,
            "tree_submit_edit",
            Intent::SubmitEdit {
                person_id: PersonId::new("10"),
                changes: AttributeChanges::new().set(PersonField::FirstName, "Asha"),
            },
        );
        assert!(!failed.ok);
        assert_eq!(failed.error_kind.as_deref(), Some("persistence"));
        assert!(failed.unsaved_changes);
        assert_eq!(first_name_of(&failed.snapshot_json, "10").as_deref(), Some("Asha"));

        let current = slot.snapshot(&config);
        assert!(current.unsaved_changes);
        assert_eq!(first_name_of(&current.snapshot_json, "10").as_deref(), Some("Asha"));

        reject_writes.store(false, Ordering::SeqCst);
        let retried = slot.retry_persist(&config);
        assert!(retried.ok, "{}", retried.message);
        assert!(!retried.unsaved_changes);

        let session = slot
            .session(&config)
            .unwrap_or_else(|resp| panic!("{}", resp.message));
        let saved = session
            .persistence()
            .blobs()
            .get(SNAPSHOT_BLOB_KEY)
            .expect("read blob")
            .expect("blob written after retry");
        assert!(saved.contains("Asha"));
    }
}
