//! View binding contracts.
//!
//! # Responsibility
//! - Define the narrow seam between the core and any rendering frontend.
//! - Describe the intents a frontend may emit and the feedback it receives.
//!
//! # Invariants
//! - Frontends only ever see snapshot copies; they never hold store state.
//! - Every rejected intent produces exactly one `Feedback` report.

use crate::access::gate::OperationKind;
use crate::model::person::{AttributeChanges, Person, PersonDraft, PersonId, RelationKind};
use crate::model::snapshot::TreeSnapshot;
use crate::service::error::{ErrorKind, TreeError};

/// Form title shown to restricted viewers.
pub const READ_ONLY_TITLE: &str = "Person Details";
/// Form title shown to admins.
pub const EDITABLE_TITLE: &str = "Edit Person";

/// Rendering frontend driven by the session.
pub trait ViewBinding {
    /// Re-initializes the rendering from a complete snapshot.
    fn render(&mut self, snapshot: &TreeSnapshot);
    /// Shows the detail form of one person.
    fn show_person(&mut self, card: &PersonCard);
    /// Surfaces a rejected intent to the user.
    fn report(&mut self, feedback: &Feedback);
}

/// User intent emitted by a frontend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Open(PersonId),
    SubmitEdit {
        person_id: PersonId,
        changes: AttributeChanges,
    },
    AddRelative {
        anchor_id: PersonId,
        draft: PersonDraft,
        kind: RelationKind,
    },
    RemoveRelative {
        anchor_id: PersonId,
        relative_id: PersonId,
    },
    RemovePerson(PersonId),
    SetPartnership {
        person_id: PersonId,
        partner_id: PersonId,
        marriage_date: Option<String>,
    },
    /// Debug hook: drop the saved snapshot and reload the bundled default.
    Reset,
}

impl Intent {
    /// Operation checked by the permission gate.
    pub fn operation(&self) -> OperationKind {
        match self {
            Self::Open(_) => OperationKind::Open,
            Self::SubmitEdit { .. } => OperationKind::EditAttributes,
            Self::AddRelative { .. } => OperationKind::AddRelative,
            Self::RemoveRelative { .. } => OperationKind::RemoveRelative,
            Self::RemovePerson(_) => OperationKind::RemovePerson,
            Self::SetPartnership { .. } => OperationKind::SetPartnership,
            Self::Reset => OperationKind::ResetData,
        }
    }
}

/// Detail form projection of one person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonCard {
    pub person: Person,
    /// All fields are presented read-only and action buttons are hidden.
    pub read_only: bool,
    pub title: &'static str,
}

impl PersonCard {
    pub fn new(person: Person, read_only: bool) -> Self {
        let title = if read_only {
            READ_ONLY_TITLE
        } else {
            EDITABLE_TITLE
        };
        Self {
            person,
            read_only,
            title,
        }
    }
}

/// User-visible signal for a rejected intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub operation: OperationKind,
    pub kind: ErrorKind,
    pub message: String,
}

impl Feedback {
    pub fn from_error(operation: OperationKind, err: &TreeError) -> Self {
        Self {
            operation,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Successful intent result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    Opened(PersonCard),
    Edited(Person),
    RelativeAdded(PersonId),
    RelativeRemoved(RelationKind),
    PersonRemoved(PersonId),
    PartnershipUpdated,
    Reset,
}

/// View that keeps the latest render, card and every feedback report.
///
/// Used by headless frontends (FFI, CLI) and tests.
#[derive(Debug, Clone, Default)]
pub struct CapturingView {
    pub renders: usize,
    pub last_render: Option<TreeSnapshot>,
    pub last_card: Option<PersonCard>,
    pub feedback: Vec<Feedback>,
}

impl CapturingView {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ViewBinding for CapturingView {
    fn render(&mut self, snapshot: &TreeSnapshot) {
        self.renders += 1;
        self.last_render = Some(snapshot.clone());
    }

    fn show_person(&mut self, card: &PersonCard) {
        self.last_card = Some(card.clone());
    }

    fn report(&mut self, feedback: &Feedback) {
        self.feedback.push(feedback.clone());
    }
}
