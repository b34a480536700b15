//! Person domain model.
//!
//! # Responsibility
//! - Define the canonical person record and its relationship references.
//! - Normalize and validate attribute values before they reach the store.
//!
//! # Invariants
//! - `id` is stable and never reassigned after creation.
//! - A counterpart id appears in at most one relationship set of a person.
//! - Blank attribute values are never stored; they mean "unset".

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static PERSON_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._:-]*$").expect("valid person id regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Stable identifier of one person in the tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(String);

impl PersonId {
    /// Wraps an existing id without validation.
    ///
    /// Validation happens when the id enters the store.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a fresh id for a newly added relative.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns whether the id has the accepted shape.
    pub fn is_valid(&self) -> bool {
        PERSON_ID_RE.is_match(self.0.as_str())
    }
}

impl Display for PersonId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<&str> for PersonId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Editable person field.
///
/// Wire names match the form field names used by the charting engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PersonField {
    #[serde(rename = "first name")]
    FirstName,
    #[serde(rename = "last name")]
    LastName,
    #[serde(rename = "birthday")]
    Birthday,
    #[serde(rename = "anniversary")]
    Anniversary,
    #[serde(rename = "mobile_no")]
    MobileNumber,
    #[serde(rename = "whatsapp_number")]
    WhatsappNumber,
    #[serde(rename = "achievements")]
    Achievements,
    #[serde(rename = "profession")]
    Profession,
    #[serde(rename = "address")]
    Address,
    #[serde(rename = "death_date")]
    DeathDate,
    #[serde(rename = "nick_name")]
    Nickname,
    #[serde(rename = "gender")]
    Gender,
}

impl PersonField {
    /// Form fields in display order. `gender` is not a form field.
    pub const FORM_FIELDS: [PersonField; 11] = [
        Self::FirstName,
        Self::LastName,
        Self::Birthday,
        Self::Anniversary,
        Self::MobileNumber,
        Self::WhatsappNumber,
        Self::Achievements,
        Self::Profession,
        Self::Address,
        Self::DeathDate,
        Self::Nickname,
    ];

    /// Stable wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstName => "first name",
            Self::LastName => "last name",
            Self::Birthday => "birthday",
            Self::Anniversary => "anniversary",
            Self::MobileNumber => "mobile_no",
            Self::WhatsappNumber => "whatsapp_number",
            Self::Achievements => "achievements",
            Self::Profession => "profession",
            Self::Address => "address",
            Self::DeathDate => "death_date",
            Self::Nickname => "nick_name",
            Self::Gender => "gender",
        }
    }

    /// Parses one wire name. Accepts `first_name`/`last_name` spellings too.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "first name" | "first_name" => Some(Self::FirstName),
            "last name" | "last_name" => Some(Self::LastName),
            "birthday" => Some(Self::Birthday),
            "anniversary" => Some(Self::Anniversary),
            "mobile_no" => Some(Self::MobileNumber),
            "whatsapp_number" => Some(Self::WhatsappNumber),
            "achievements" => Some(Self::Achievements),
            "profession" => Some(Self::Profession),
            "address" => Some(Self::Address),
            "death_date" => Some(Self::DeathDate),
            "nick_name" => Some(Self::Nickname),
            "gender" => Some(Self::Gender),
            _ => None,
        }
    }
}

/// Gender marker used for card styling and parent slot selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "M" => Some(Self::Male),
            "F" => Some(Self::Female),
            _ => None,
        }
    }
}

/// Attribute map of one person. Absent fields are unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<PersonField, String>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: PersonField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PersonField, &str)> {
        self.0.iter().map(|(field, value)| (*field, value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Applies a change set. Values are normalized; blank values clear the field.
    pub fn apply(&mut self, changes: &AttributeChanges) -> Result<(), ValidationError> {
        let mut next = self.0.clone();
        for (field, value) in changes.iter() {
            match value.and_then(|raw| normalize_value(*field, raw).transpose()) {
                Some(normalized) => {
                    next.insert(*field, normalized?);
                }
                None => {
                    next.remove(field);
                }
            }
        }
        self.0 = next;
        Ok(())
    }

    /// Returns a normalized copy: values cleaned, blank values dropped.
    ///
    /// Used when foreign datasets enter the store.
    pub fn normalized(&self) -> Result<Self, ValidationError> {
        let mut cleaned = BTreeMap::new();
        for (field, value) in &self.0 {
            if let Some(normalized) = normalize_value(*field, value)? {
                cleaned.insert(*field, normalized);
            }
        }
        Ok(Self(cleaned))
    }
}

impl FromIterator<(PersonField, String)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (PersonField, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Requested attribute edits. `None` clears the field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeChanges(BTreeMap<PersonField, Option<String>>);

impl AttributeChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one field. Chainable.
    pub fn set(mut self, field: PersonField, value: impl Into<String>) -> Self {
        self.0.insert(field, Some(value.into()));
        self
    }

    /// Clears one field. Chainable.
    pub fn clear(mut self, field: PersonField) -> Self {
        self.0.insert(field, None);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PersonField, Option<&str>)> {
        self.0.iter().map(|(field, value)| (field, value.as_deref()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One partner edge with its optional metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerLink {
    pub id: PersonId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marriage_date: Option<String>,
}

/// Relationship kind as seen from the anchor person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    Parent,
    Child,
    Partner,
}

impl RelationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Child => "child",
            Self::Partner => "partner",
        }
    }

    /// Kind of the same edge seen from the other endpoint.
    pub fn inverse(self) -> Self {
        match self {
            Self::Parent => Self::Child,
            Self::Child => Self::Parent,
            Self::Partner => Self::Partner,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "parent" => Some(Self::Parent),
            "child" => Some(Self::Child),
            "partner" | "spouse" => Some(Self::Partner),
            _ => None,
        }
    }
}

impl Display for RelationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship references of one person.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationships {
    #[serde(default)]
    pub parents: BTreeSet<PersonId>,
    #[serde(default)]
    pub children: BTreeSet<PersonId>,
    /// Serialized as `spouses` to match the charting engine dataset shape.
    #[serde(default, rename = "spouses")]
    pub partners: Vec<PartnerLink>,
}

impl Relationships {
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty() && self.children.is_empty() && self.partners.is_empty()
    }

    pub fn partner(&self, id: &PersonId) -> Option<&PartnerLink> {
        self.partners.iter().find(|link| link.id == *id)
    }

    pub fn partner_mut(&mut self, id: &PersonId) -> Option<&mut PartnerLink> {
        self.partners.iter_mut().find(|link| link.id == *id)
    }

    /// Returns how `other` relates to this person, if at all.
    pub fn kind_of(&self, other: &PersonId) -> Option<RelationKind> {
        if self.parents.contains(other) {
            Some(RelationKind::Parent)
        } else if self.children.contains(other) {
            Some(RelationKind::Child)
        } else if self.partner(other).is_some() {
            Some(RelationKind::Partner)
        } else {
            None
        }
    }

    /// Iterates every referenced counterpart with the relation kind.
    pub fn edges(&self) -> impl Iterator<Item = (RelationKind, &PersonId)> {
        self.parents
            .iter()
            .map(|id| (RelationKind::Parent, id))
            .chain(self.children.iter().map(|id| (RelationKind::Child, id)))
            .chain(
                self.partners
                    .iter()
                    .map(|link| (RelationKind::Partner, &link.id)),
            )
    }

    pub(crate) fn insert(&mut self, kind: RelationKind, id: PersonId, marriage_date: Option<String>) {
        match kind {
            RelationKind::Parent => {
                self.parents.insert(id);
            }
            RelationKind::Child => {
                self.children.insert(id);
            }
            RelationKind::Partner => self.partners.push(PartnerLink { id, marriage_date }),
        }
    }

    /// Removes any edge to `other`. Returns the removed kind.
    pub(crate) fn remove(&mut self, other: &PersonId) -> Option<RelationKind> {
        let kind = self.kind_of(other)?;
        match kind {
            RelationKind::Parent => {
                self.parents.remove(other);
            }
            RelationKind::Child => {
                self.children.remove(other);
            }
            RelationKind::Partner => self.partners.retain(|link| link.id != *other),
        }
        Some(kind)
    }
}

/// Canonical person record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    /// Serialized as `data` to match the charting engine dataset shape.
    #[serde(default, rename = "data")]
    pub attributes: Attributes,
    #[serde(default, rename = "rels")]
    pub relationships: Relationships,
}

impl Person {
    /// Creates an unlinked person with the given id.
    pub fn new(id: PersonId, attributes: Attributes) -> Self {
        Self {
            id,
            attributes,
            relationships: Relationships::default(),
        }
    }

    pub fn gender(&self) -> Option<Gender> {
        self.attributes
            .get(PersonField::Gender)
            .and_then(Gender::parse)
    }

    /// Human-readable label: first and last name, falling back to the id.
    pub fn display_name(&self) -> String {
        let parts = [PersonField::FirstName, PersonField::LastName]
            .into_iter()
            .filter_map(|field| self.attributes.get(field))
            .collect::<Vec<_>>();
        if parts.is_empty() {
            self.id.to_string()
        } else {
            parts.join(" ")
        }
    }

    /// Validates record-local invariants (id shape, set overlap).
    ///
    /// Cross-record invariants (symmetry, dangling refs) are checked by the store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.id.is_valid() {
            return Err(ValidationError::InvalidId(self.id.clone()));
        }

        let mut seen = BTreeSet::new();
        for (kind, other) in self.relationships.edges() {
            if *other == self.id {
                return Err(ValidationError::SelfReference {
                    person: self.id.clone(),
                    kind,
                });
            }
            if !seen.insert(other) {
                return Err(ValidationError::ConflictingRelation {
                    person: self.id.clone(),
                    other: other.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Input for a new relative created from an anchor's card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonDraft {
    pub changes: AttributeChanges,
    /// Only meaningful when the relative is added as a partner.
    pub marriage_date: Option<String>,
    /// Partner of the anchor who becomes the second parent of a new child.
    pub other_parent: Option<PersonId>,
}

impl PersonDraft {
    pub fn new(changes: AttributeChanges) -> Self {
        Self {
            changes,
            marriage_date: None,
            other_parent: None,
        }
    }

    pub fn with_marriage_date(mut self, marriage_date: impl Into<String>) -> Self {
        self.marriage_date = Some(marriage_date.into());
        self
    }

    pub fn with_other_parent(mut self, other_parent: PersonId) -> Self {
        self.other_parent = Some(other_parent);
        self
    }
}

/// Dataset and edit validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Id is empty or contains unsupported characters.
    InvalidId(PersonId),
    /// Two records share one id.
    DuplicateId(PersonId),
    /// Attribute value breaks the field rules.
    InvalidAttribute { field: PersonField, value: String },
    /// A person references itself.
    SelfReference { person: PersonId, kind: RelationKind },
    /// A counterpart appears in more than one relationship set.
    ConflictingRelation { person: PersonId, other: PersonId },
    /// Reference to an id that is not in the store.
    DanglingReference {
        person: PersonId,
        missing: PersonId,
        kind: RelationKind,
    },
    /// Edge present on one endpoint only, or partner metadata differs.
    AsymmetricEdge {
        person: PersonId,
        other: PersonId,
        kind: RelationKind,
    },
    /// Edge already exists between the two persons.
    EdgeAlreadyExists { person: PersonId, other: PersonId },
    /// Anchor already has two parents.
    ParentSlotsFull(PersonId),
    /// Person still has edges and cannot be dropped on its own.
    PersonStillLinked(PersonId),
    /// Anchor of a relative-add does not exist.
    UnknownAnchor(PersonId),
    /// Named co-parent is not a partner of the anchor.
    NotAPartner { person: PersonId, other: PersonId },
    /// A co-parent was named for a relative that is not a child.
    OtherParentNotApplicable(RelationKind),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId(id) => write!(f, "invalid person id: `{id}`"),
            Self::DuplicateId(id) => write!(f, "duplicate person id: {id}"),
            Self::InvalidAttribute { field, value } => write!(
                f,
                "invalid value `{value}` for field `{}`",
                field.as_str()
            ),
            Self::SelfReference { person, kind } => {
                write!(f, "person {person} cannot be their own {kind}")
            }
            Self::ConflictingRelation { person, other } => write!(
                f,
                "person {person} references {other} in more than one relationship set"
            ),
            Self::DanglingReference {
                person,
                missing,
                kind,
            } => write!(f, "person {person} lists missing {kind} {missing}"),
            Self::AsymmetricEdge {
                person,
                other,
                kind,
            } => write!(
                f,
                "{kind} edge {person} -> {other} has no matching inverse edge"
            ),
            Self::EdgeAlreadyExists { person, other } => {
                write!(f, "persons {person} and {other} are already related")
            }
            Self::ParentSlotsFull(id) => write!(f, "person {id} already has two parents"),
            Self::PersonStillLinked(id) => {
                write!(f, "person {id} still has relationship edges")
            }
            Self::UnknownAnchor(id) => write!(f, "anchor person does not exist: {id}"),
            Self::NotAPartner { person, other } => {
                write!(f, "person {other} is not a partner of {person}")
            }
            Self::OtherParentNotApplicable(kind) => {
                write!(f, "a second parent can only be named for a new child, not a {kind}")
            }
        }
    }
}

impl Error for ValidationError {}

/// Trims, collapses inner whitespace and applies per-field rules.
///
/// Returns `Ok(None)` for blank input.
fn normalize_value(field: PersonField, raw: &str) -> Result<Option<String>, ValidationError> {
    let collapsed = WHITESPACE_RE.replace_all(raw.trim(), " ").into_owned();
    if collapsed.is_empty() {
        return Ok(None);
    }
    if field == PersonField::Gender && Gender::parse(collapsed.as_str()).is_none() {
        return Err(ValidationError::InvalidAttribute {
            field,
            value: raw.to_string(),
        });
    }
    Ok(Some(collapsed))
}
