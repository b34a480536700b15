//! Tree snapshot and bundled default dataset.
//!
//! # Responsibility
//! - Provide the immutable, serializable copy of the full tree state.
//! - Ship the default dataset used when nothing was persisted.
//!
//! # Invariants
//! - A snapshot is a complete replacement, never a delta.
//! - The bundled default dataset always passes store validation.

use crate::model::person::{Person, PersonId};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

const BUNDLED_DEFAULT_JSON: &str = include_str!("../../data/default_family.json");

static BUNDLED_DEFAULT: Lazy<TreeSnapshot> = Lazy::new(|| {
    serde_json::from_str(BUNDLED_DEFAULT_JSON).expect("bundled default dataset must parse")
});

/// Complete copy of the tree state at one point in time.
///
/// Serialized as a bare person array, the charting engine's dataset shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreeSnapshot {
    persons: Vec<Person>,
}

impl TreeSnapshot {
    pub fn new(persons: Vec<Person>) -> Self {
        Self { persons }
    }

    /// Returns the bundled default dataset.
    pub fn bundled_default() -> Self {
        BUNDLED_DEFAULT.clone()
    }

    pub fn persons(&self) -> &[Person] {
        &self.persons
    }

    pub fn into_persons(self) -> Vec<Person> {
        self.persons
    }

    pub fn get(&self, id: &PersonId) -> Option<&Person> {
        self.persons.iter().find(|person| person.id == *id)
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    /// Returns a copy with persons ordered by id, for order-insensitive comparison.
    pub fn sorted(&self) -> Self {
        let mut persons = self.persons.clone();
        persons.sort_by(|left, right| left.id.cmp(&right.id));
        Self { persons }
    }

    /// Encodes the snapshot as compact JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
