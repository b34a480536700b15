//! In-memory person record store.
//!
//! # Responsibility
//! - Own every person record of the current tree.
//! - Validate whole datasets on load and apply staged mutation batches.
//!
//! # Invariants
//! - Stored state always satisfies symmetry and referential integrity.
//! - `load` and `apply_mutation` are all-or-nothing.
//! - Snapshot order is deterministic: ascending `PersonId`.

use crate::model::person::{
    AttributeChanges, Person, PersonId, RelationKind, ValidationError,
};
use crate::model::snapshot::TreeSnapshot;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from record store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Dataset or mutation breaks a model invariant.
    Validation(ValidationError),
    /// Referenced person does not exist.
    PersonNotFound(PersonId),
    /// The two persons are not related (by the requested edge kind).
    RelationNotFound { person: PersonId, other: PersonId },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::PersonNotFound(id) => write!(f, "person not found: {id}"),
            Self::RelationNotFound { person, other } => {
                write!(f, "no relationship between {person} and {other}")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::PersonNotFound(_) => None,
            Self::RelationNotFound { .. } => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// One primitive step of a mutation batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StoreMutation {
    /// Adds an unlinked person.
    InsertPerson(Person),
    /// Drops a person that has no remaining edges.
    RemovePerson(PersonId),
    /// Edits attributes of one person.
    ChangeAttributes {
        id: PersonId,
        changes: AttributeChanges,
    },
    /// Adds the edge "`to` is `from`'s `kind`" on both endpoints.
    Link {
        from: PersonId,
        to: PersonId,
        kind: RelationKind,
        marriage_date: Option<String>,
    },
    /// Removes whatever edge joins the two persons, on both endpoints.
    Unlink { from: PersonId, to: PersonId },
    /// Replaces partner-edge metadata on both endpoints.
    SetPartnership {
        from: PersonId,
        to: PersonId,
        marriage_date: Option<String>,
    },
}

/// Authoritative in-memory collection of person records.
#[derive(Debug, Clone, Default)]
pub struct PersonStore {
    persons: BTreeMap<PersonId, Person>,
}

impl PersonStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store from a dataset, validating it first.
    pub fn from_snapshot(snapshot: TreeSnapshot) -> StoreResult<Self> {
        let mut store = Self::new();
        store.load(snapshot)?;
        Ok(store)
    }

    /// Replaces the whole state with `dataset`.
    ///
    /// # Errors
    /// - `Validation` for invalid ids, duplicate ids, self references, dangling
    ///   references or asymmetric edges. The previous state is kept untouched.
    pub fn load(&mut self, dataset: TreeSnapshot) -> StoreResult<()> {
        let persons = validate_dataset(dataset)?;
        self.persons = persons;
        Ok(())
    }

    /// Returns an independent copy of the full state.
    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot::new(self.persons.values().cloned().collect())
    }

    /// Loads one person by id.
    pub fn get_person(&self, id: &PersonId) -> StoreResult<&Person> {
        self.persons
            .get(id)
            .ok_or_else(|| StoreError::PersonNotFound(id.clone()))
    }

    pub fn contains(&self, id: &PersonId) -> bool {
        self.persons.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    /// Iterates persons in id order.
    pub fn persons(&self) -> impl Iterator<Item = &Person> {
        self.persons.values()
    }

    /// Applies one batch atomically.
    ///
    /// Steps run in order against a staging overlay; the overlay is committed
    /// only when every step succeeded.
    pub(crate) fn apply_mutation(&mut self, steps: Vec<StoreMutation>) -> StoreResult<()> {
        let overlay = {
            let mut staging = Staging::new(&self.persons);
            for step in steps {
                staging.apply(step)?;
            }
            staging.overlay
        };

        for (id, entry) in overlay {
            match entry {
                Some(person) => {
                    self.persons.insert(id, person);
                }
                None => {
                    self.persons.remove(&id);
                }
            }
        }
        Ok(())
    }
}

/// Copy-on-write view over the committed records.
struct Staging<'a> {
    base: &'a BTreeMap<PersonId, Person>,
    /// `None` marks a removed person.
    overlay: BTreeMap<PersonId, Option<Person>>,
}

impl<'a> Staging<'a> {
    fn new(base: &'a BTreeMap<PersonId, Person>) -> Self {
        Self {
            base,
            overlay: BTreeMap::new(),
        }
    }

    fn get(&self, id: &PersonId) -> Option<&Person> {
        match self.overlay.get(id) {
            Some(entry) => entry.as_ref(),
            None => self.base.get(id),
        }
    }

    fn require(&self, id: &PersonId) -> StoreResult<&Person> {
        self.get(id)
            .ok_or_else(|| StoreError::PersonNotFound(id.clone()))
    }

    fn get_mut(&mut self, id: &PersonId) -> StoreResult<&mut Person> {
        if !self.overlay.contains_key(id) {
            let person = self
                .base
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::PersonNotFound(id.clone()))?;
            self.overlay.insert(id.clone(), Some(person));
        }
        self.overlay
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or_else(|| StoreError::PersonNotFound(id.clone()))
    }

    fn apply(&mut self, step: StoreMutation) -> StoreResult<()> {
        match step {
            StoreMutation::InsertPerson(person) => {
                person.validate()?;
                if self.get(&person.id).is_some() {
                    return Err(ValidationError::DuplicateId(person.id).into());
                }
                if !person.relationships.is_empty() {
                    return Err(ValidationError::PersonStillLinked(person.id).into());
                }
                self.overlay.insert(person.id.clone(), Some(person));
            }
            StoreMutation::RemovePerson(id) => {
                if !self.require(&id)?.relationships.is_empty() {
                    return Err(ValidationError::PersonStillLinked(id).into());
                }
                self.overlay.insert(id, None);
            }
            StoreMutation::ChangeAttributes { id, changes } => {
                self.get_mut(&id)?.attributes.apply(&changes)?;
            }
            StoreMutation::Link {
                from,
                to,
                kind,
                marriage_date,
            } => {
                if from == to {
                    return Err(ValidationError::SelfReference { person: from, kind }.into());
                }
                let already_related = self.require(&from)?.relationships.kind_of(&to).is_some()
                    || self.require(&to)?.relationships.kind_of(&from).is_some();
                if already_related {
                    return Err(ValidationError::EdgeAlreadyExists {
                        person: from,
                        other: to,
                    }
                    .into());
                }
                self.get_mut(&from)?
                    .relationships
                    .insert(kind, to.clone(), marriage_date.clone());
                self.get_mut(&to)?
                    .relationships
                    .insert(kind.inverse(), from, marriage_date);
            }
            StoreMutation::Unlink { from, to } => {
                self.require(&to)?;
                let kind = self
                    .get_mut(&from)?
                    .relationships
                    .remove(&to)
                    .ok_or_else(|| StoreError::RelationNotFound {
                        person: from.clone(),
                        other: to.clone(),
                    })?;
                if self.get_mut(&to)?.relationships.remove(&from) != Some(kind.inverse()) {
                    return Err(ValidationError::AsymmetricEdge {
                        person: from,
                        other: to,
                        kind,
                    }
                    .into());
                }
            }
            StoreMutation::SetPartnership {
                from,
                to,
                marriage_date,
            } => {
                self.require(&to)?;
                for (person, other) in [(&from, &to), (&to, &from)] {
                    let link = self
                        .get_mut(person)?
                        .relationships
                        .partner_mut(other)
                        .ok_or_else(|| StoreError::RelationNotFound {
                            person: from.clone(),
                            other: to.clone(),
                        })?;
                    link.marriage_date = marriage_date.clone();
                }
            }
        }
        Ok(())
    }
}

fn validate_dataset(dataset: TreeSnapshot) -> StoreResult<BTreeMap<PersonId, Person>> {
    let mut persons = BTreeMap::new();
    for mut person in dataset.into_persons() {
        person.attributes = person.attributes.normalized()?;
        person.validate()?;
        if persons.contains_key(&person.id) {
            return Err(ValidationError::DuplicateId(person.id).into());
        }
        persons.insert(person.id.clone(), person);
    }

    for person in persons.values() {
        for (kind, other) in person.relationships.edges() {
            let counterpart =
                persons
                    .get(other)
                    .ok_or_else(|| ValidationError::DanglingReference {
                        person: person.id.clone(),
                        missing: other.clone(),
                        kind,
                    })?;
            ensure_inverse_edge(person, counterpart, kind)?;
        }
    }
    Ok(persons)
}

fn ensure_inverse_edge(
    person: &Person,
    counterpart: &Person,
    kind: RelationKind,
) -> Result<(), ValidationError> {
    let symmetric = match kind {
        RelationKind::Parent => counterpart.relationships.children.contains(&person.id),
        RelationKind::Child => counterpart.relationships.parents.contains(&person.id),
        RelationKind::Partner => match (
            person.relationships.partner(&counterpart.id),
            counterpart.relationships.partner(&person.id),
        ) {
            (Some(left), Some(right)) => left.marriage_date == right.marriage_date,
            _ => false,
        },
    };
    if symmetric {
        Ok(())
    } else {
        Err(ValidationError::AsymmetricEdge {
            person: person.id.clone(),
            other: counterpart.id.clone(),
            kind,
        })
    }
}
