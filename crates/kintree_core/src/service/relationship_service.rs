//! Relationship consistency engine.
//!
//! # Responsibility
//! - Translate one edit intent into a single all-or-nothing store batch.
//! - Keep both endpoints of every edge in sync.
//!
//! # Invariants
//! - A failed operation leaves the store exactly as it was.
//! - Removing an edge never removes a person; these are separate intents.
//! - Adding a parent never displaces an existing parent.

use crate::model::person::{
    AttributeChanges, Attributes, Person, PersonDraft, PersonId, RelationKind, ValidationError,
};
use crate::repo::person_store::{PersonStore, StoreMutation};
use crate::service::error::{TreeError, TreeResult};

/// Upper bound of parent references created through `add_relative`.
pub const MAX_PARENTS: usize = 2;

/// Consistency engine over one borrowed record store.
pub struct RelationshipService<'store> {
    store: &'store mut PersonStore,
}

impl<'store> RelationshipService<'store> {
    pub fn new(store: &'store mut PersonStore) -> Self {
        Self { store }
    }

    /// Updates attributes of one person. No relationship side effects.
    pub fn edit_attributes(
        &mut self,
        person_id: &PersonId,
        changes: &AttributeChanges,
    ) -> TreeResult<Person> {
        self.store.get_person(person_id)?;
        self.store.apply_mutation(vec![StoreMutation::ChangeAttributes {
            id: person_id.clone(),
            changes: changes.clone(),
        }])?;
        Ok(self.store.get_person(person_id)?.clone())
    }

    /// Creates a new person from `draft` and links it to the anchor as `kind`.
    ///
    /// For a new child, `draft.other_parent` names the anchor's partner who
    /// becomes the second parent.
    ///
    /// # Errors
    /// - `Validation(UnknownAnchor)` when the anchor does not exist.
    /// - `Validation(ParentSlotsFull)` when adding a third parent.
    /// - `Validation(NotAPartner)` when `other_parent` is not the anchor's partner.
    /// - `Validation(OtherParentNotApplicable)` when `other_parent` is set for a
    ///   parent or partner.
    pub fn add_relative(
        &mut self,
        anchor_id: &PersonId,
        draft: &PersonDraft,
        kind: RelationKind,
    ) -> TreeResult<PersonId> {
        let anchor = self
            .store
            .get_person(anchor_id)
            .map_err(|_| ValidationError::UnknownAnchor(anchor_id.clone()))?;

        if kind == RelationKind::Parent && anchor.relationships.parents.len() >= MAX_PARENTS {
            return Err(ValidationError::ParentSlotsFull(anchor_id.clone()).into());
        }

        let co_parent = match (&draft.other_parent, kind) {
            (Some(other), RelationKind::Child) => {
                if anchor.relationships.partner(other).is_none() {
                    return Err(ValidationError::NotAPartner {
                        person: anchor_id.clone(),
                        other: other.clone(),
                    }
                    .into());
                }
                Some(other.clone())
            }
            (Some(_), RelationKind::Parent | RelationKind::Partner) => {
                return Err(ValidationError::OtherParentNotApplicable(kind).into());
            }
            (None, _) => None,
        };

        let mut attributes = Attributes::new();
        attributes.apply(&draft.changes)?;
        let relative_id = self.fresh_id();
        let marriage_date = match kind {
            RelationKind::Partner => draft.marriage_date.clone(),
            RelationKind::Parent | RelationKind::Child => None,
        };

        let mut steps = vec![
            StoreMutation::InsertPerson(Person::new(relative_id.clone(), attributes)),
            StoreMutation::Link {
                from: anchor_id.clone(),
                to: relative_id.clone(),
                kind,
                marriage_date,
            },
        ];
        if let Some(co_parent) = co_parent {
            steps.push(StoreMutation::Link {
                from: co_parent,
                to: relative_id.clone(),
                kind: RelationKind::Child,
                marriage_date: None,
            });
        }
        self.store.apply_mutation(steps)?;
        Ok(relative_id)
    }

    /// Removes the edge between anchor and relative on both records.
    ///
    /// # Errors
    /// - `PersonNotFound` when either person is missing.
    /// - `RelationNotFound` when no edge joins them (e.g. second removal).
    pub fn remove_relative(
        &mut self,
        anchor_id: &PersonId,
        relative_id: &PersonId,
    ) -> TreeResult<RelationKind> {
        let kind = self
            .store
            .get_person(anchor_id)?
            .relationships
            .kind_of(relative_id);
        self.store.get_person(relative_id)?;
        let kind = kind.ok_or_else(|| TreeError::RelationNotFound {
            person: anchor_id.clone(),
            other: relative_id.clone(),
        })?;

        self.store.apply_mutation(vec![StoreMutation::Unlink {
            from: anchor_id.clone(),
            to: relative_id.clone(),
        }])?;
        Ok(kind)
    }

    /// Deletes one person and every edge pointing at it.
    pub fn remove_person(&mut self, person_id: &PersonId) -> TreeResult<Person> {
        let person = self.store.get_person(person_id)?.clone();
        let mut steps = person
            .relationships
            .edges()
            .map(|(_, other)| StoreMutation::Unlink {
                from: person_id.clone(),
                to: other.clone(),
            })
            .collect::<Vec<_>>();
        steps.push(StoreMutation::RemovePerson(person_id.clone()));
        self.store.apply_mutation(steps)?;
        Ok(person)
    }

    /// Replaces the marriage date of a partner edge on both records.
    pub fn set_partnership(
        &mut self,
        person_id: &PersonId,
        partner_id: &PersonId,
        marriage_date: Option<String>,
    ) -> TreeResult<()> {
        let marriage_date = marriage_date
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        self.store.apply_mutation(vec![StoreMutation::SetPartnership {
            from: person_id.clone(),
            to: partner_id.clone(),
            marriage_date,
        }])?;
        Ok(())
    }

    fn fresh_id(&self) -> PersonId {
        loop {
            let candidate = PersonId::generate();
            if !self.store.contains(&candidate) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RelationshipService;
    use crate::model::person::{
        AttributeChanges, PersonDraft, PersonField, PersonId, RelationKind, ValidationError,
    };
    use crate::model::snapshot::TreeSnapshot;
    use crate::repo::person_store::PersonStore;
    use crate::service::error::{ErrorKind, TreeError};

    fn default_store() -> PersonStore {
        PersonStore::from_snapshot(TreeSnapshot::bundled_default()).expect("default dataset")
    }

    fn id(value: &str) -> PersonId {
        PersonId::new(value)
    }

    fn named(first_name: &str) -> PersonDraft {
        PersonDraft::new(AttributeChanges::new().set(PersonField::FirstName, first_name))
    }

    /// Every edge must be mirrored on its counterpart.
    fn assert_symmetric(store: &PersonStore) {
        for person in store.persons() {
            for (kind, other) in person.relationships.edges() {
                let counterpart = store
                    .get_person(other)
                    .expect("referenced person should exist");
                assert_eq!(
                    counterpart.relationships.kind_of(&person.id),
                    Some(kind.inverse()),
                    "edge {} -> {} is not mirrored",
                    person.id,
                    other
                );
            }
        }
    }

    #[test]
    fn edit_attributes_changes_only_target() {
        let mut store = default_store();
        let before = store.snapshot();
        let updated = RelationshipService::new(&mut store)
            .edit_attributes(
                &id("10"),
                &AttributeChanges::new().set(PersonField::FirstName, "Asha"),
            )
            .expect("edit should succeed");
        assert_eq!(updated.attributes.get(PersonField::FirstName), Some("Asha"));

        for (old, new) in before.persons().iter().zip(store.snapshot().persons()) {
            if old.id != id("10") {
                assert_eq!(old, new);
            } else {
                assert_eq!(old.relationships, new.relationships);
            }
        }
    }

    #[test]
    fn edit_attributes_missing_person_is_not_found() {
        let mut store = default_store();
        let err = RelationshipService::new(&mut store)
            .edit_attributes(&id("404"), &AttributeChanges::new())
            .expect_err("missing person");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn add_child_links_both_sides() {
        let mut store = default_store();
        let child_id = RelationshipService::new(&mut store)
            .add_relative(&id("11"), &named("Tara"), RelationKind::Child)
            .expect("add child");

        let child = store.get_person(&child_id).expect("child exists");
        assert!(child.relationships.parents.contains(&id("11")));
        assert!(store
            .get_person(&id("11"))
            .expect("anchor")
            .relationships
            .children
            .contains(&child_id));
        assert_symmetric(&store);
    }

    #[test]
    fn add_child_with_co_parent_links_both_parents() {
        let mut store = default_store();
        let draft = named("Riya").with_other_parent(id("13"));
        let child_id = RelationshipService::new(&mut store)
            .add_relative(&id("10"), &draft, RelationKind::Child)
            .expect("add child with co-parent");

        let child = store.get_person(&child_id).expect("child exists");
        assert_eq!(child.relationships.parents.len(), 2);
        assert!(child.relationships.parents.contains(&id("13")));
        assert_symmetric(&store);
    }

    #[test]
    fn add_child_rejects_co_parent_who_is_not_partner() {
        let mut store = default_store();
        let before = store.snapshot();
        let draft = named("Riya").with_other_parent(id("11"));
        let err = RelationshipService::new(&mut store)
            .add_relative(&id("10"), &draft, RelationKind::Child)
            .expect_err("sibling is not a partner");
        assert!(matches!(
            err,
            TreeError::Validation(ValidationError::NotAPartner { .. })
        ));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn co_parent_on_non_child_relative_is_rejected() {
        let mut store = default_store();
        let before = store.snapshot();
        for kind in [RelationKind::Parent, RelationKind::Partner] {
            let draft = named("Riya").with_other_parent(id("13"));
            let err = RelationshipService::new(&mut store)
                .add_relative(&id("11"), &draft, kind)
                .expect_err("co-parent only applies to children");
            assert!(matches!(
                err,
                TreeError::Validation(ValidationError::OtherParentNotApplicable(found)) if found == kind
            ));
        }
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn add_partner_mirrors_marriage_date() {
        let mut store = default_store();
        let draft = named("Dev").with_marriage_date("2018-12-01");
        let partner_id = RelationshipService::new(&mut store)
            .add_relative(&id("11"), &draft, RelationKind::Partner)
            .expect("add partner");

        let anchor = store.get_person(&id("11")).expect("anchor");
        let partner = store.get_person(&partner_id).expect("partner");
        assert_eq!(
            anchor
                .relationships
                .partner(&partner_id)
                .and_then(|link| link.marriage_date.as_deref()),
            Some("2018-12-01")
        );
        assert_eq!(
            partner
                .relationships
                .partner(&id("11"))
                .and_then(|link| link.marriage_date.as_deref()),
            Some("2018-12-01")
        );
    }

    #[test]
    fn add_parent_when_slots_are_full_keeps_existing_edges() {
        let mut store = default_store();
        let before = store.snapshot();
        let err = RelationshipService::new(&mut store)
            .add_relative(&id("10"), &named("Extra"), RelationKind::Parent)
            .expect_err("third parent must be rejected");
        assert!(matches!(
            err,
            TreeError::Validation(ValidationError::ParentSlotsFull(_))
        ));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn add_relative_to_unknown_anchor_is_validation_error() {
        let mut store = default_store();
        let err = RelationshipService::new(&mut store)
            .add_relative(&id("404"), &named("Ghost"), RelationKind::Child)
            .expect_err("unknown anchor");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.len(), TreeSnapshot::bundled_default().len());
    }

    #[test]
    fn add_relative_with_invalid_gender_creates_nothing() {
        let mut store = default_store();
        let draft = PersonDraft::new(AttributeChanges::new().set(PersonField::Gender, "unknown"));
        let err = RelationshipService::new(&mut store)
            .add_relative(&id("11"), &draft, RelationKind::Child)
            .expect_err("invalid gender");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.len(), TreeSnapshot::bundled_default().len());
    }

    #[test]
    fn remove_relative_twice_reports_not_found_and_keeps_state() {
        let mut store = default_store();
        let mut engine = RelationshipService::new(&mut store);
        let kind = engine
            .remove_relative(&id("12"), &id("6"))
            .expect("first removal");
        assert_eq!(kind, RelationKind::Parent);

        let after_first = store.snapshot();
        let err = RelationshipService::new(&mut store)
            .remove_relative(&id("12"), &id("6"))
            .expect_err("second removal");
        assert!(matches!(err, TreeError::RelationNotFound { .. }));
        assert_eq!(store.snapshot(), after_first);

        let child = store.get_person(&id("12")).expect("child is kept");
        assert!(!child.relationships.parents.contains(&id("6")));
        assert!(store.contains(&id("6")));
        assert_symmetric(&store);
    }

    #[test]
    fn remove_relative_leaves_isolated_person_in_store() {
        let mut store = default_store();
        let mut engine = RelationshipService::new(&mut store);
        engine
            .remove_relative(&id("14"), &id("10"))
            .expect("unlink father");
        engine
            .remove_relative(&id("14"), &id("13"))
            .expect("unlink mother");
        let isolated = store.get_person(&id("14")).expect("person is kept");
        assert!(isolated.relationships.is_empty());
    }

    #[test]
    fn remove_person_cascades_edges() {
        let mut store = default_store();
        RelationshipService::new(&mut store)
            .remove_person(&id("10"))
            .expect("remove person");

        assert!(matches!(
            store.get_person(&id("10")),
            Err(crate::repo::person_store::StoreError::PersonNotFound(_))
        ));
        for person in store.persons() {
            assert!(
                person.relationships.edges().all(|(_, other)| *other != id("10")),
                "{} still references removed person",
                person.id
            );
        }
        assert_symmetric(&store);
    }

    #[test]
    fn set_partnership_updates_both_records() {
        let mut store = default_store();
        RelationshipService::new(&mut store)
            .set_partnership(&id("4"), &id("6"), Some(" 1984-04-04 ".to_string()))
            .expect("set marriage date");
        for (person, other) in [("4", "6"), ("6", "4")] {
            let link = store
                .get_person(&id(person))
                .expect("person")
                .relationships
                .partner(&id(other))
                .cloned()
                .expect("partner link");
            assert_eq!(link.marriage_date.as_deref(), Some("1984-04-04"));
        }

        let err = RelationshipService::new(&mut store)
            .set_partnership(&id("4"), &id("12"), None)
            .expect_err("mother and son are not partners");
        assert!(matches!(err, TreeError::RelationNotFound { .. }));
    }
}
